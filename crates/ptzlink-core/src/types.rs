use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

// MARK: - Speed ranges

/// Pan/tilt drive speed accepted by the camera for a moving axis.
pub const PAN_TILT_SPEED: RangeInclusive<u8> = 1..=24;
/// Zoom variable speed accepted by the codec.
pub const ZOOM_SPEED: RangeInclusive<u8> = 0..=7;
/// Focus variable speed accepted by the codec.
pub const FOCUS_SPEED: RangeInclusive<u8> = 0..=8;

// MARK: - Axis

/// Independent motor axes tracked by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pan,
    Tilt,
    Zoom,
    Focus,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Pan, Axis::Tilt, Axis::Zoom, Axis::Focus];

    pub fn speed_range(&self) -> RangeInclusive<u8> {
        match self {
            Axis::Pan | Axis::Tilt => PAN_TILT_SPEED,
            Axis::Zoom => ZOOM_SPEED,
            Axis::Focus => FOCUS_SPEED,
        }
    }

    /// Clamp `speed` into this axis' valid range.
    pub fn clamp_speed(&self, speed: u8) -> u8 {
        let range = self.speed_range();
        speed.clamp(*range.start(), *range.end())
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pan => write!(f, "pan"),
            Self::Tilt => write!(f, "tilt"),
            Self::Zoom => write!(f, "zoom"),
            Self::Focus => write!(f, "focus"),
        }
    }
}

// MARK: - Directions

/// Horizontal drive direction. Wire codes: `01` right, `02` left, `03` stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanDirection {
    Right,
    Left,
    Stop,
}

/// Vertical drive direction. Wire codes: `01` up, `02` down, `03` stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltDirection {
    Up,
    Down,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusDirection {
    Near,
    Far,
    Stop,
}

impl PanDirection {
    pub fn code(&self) -> u8 {
        match self {
            Self::Right => 0x01,
            Self::Left => 0x02,
            Self::Stop => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Right),
            0x02 => Some(Self::Left),
            0x03 => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl TiltDirection {
    pub fn code(&self) -> u8 {
        match self {
            Self::Up => 0x01,
            Self::Down => 0x02,
            Self::Stop => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Up),
            0x02 => Some(Self::Down),
            0x03 => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl ZoomDirection {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl FocusDirection {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Parses a two-digit wire code (`"01"`) or a direction name (`"right"`).
impl FromStr for PanDirection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "01" | "1" | "right" => Ok(Self::Right),
            "02" | "2" | "left" => Ok(Self::Left),
            "03" | "3" | "stop" => Ok(Self::Stop),
            other => Err(CodecError::invalid(format!("pan direction '{other}'"))),
        }
    }
}

impl FromStr for TiltDirection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "01" | "1" | "up" => Ok(Self::Up),
            "02" | "2" | "down" => Ok(Self::Down),
            "03" | "3" | "stop" => Ok(Self::Stop),
            other => Err(CodecError::invalid(format!("tilt direction '{other}'"))),
        }
    }
}

impl FromStr for ZoomDirection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "tele" => Ok(Self::In),
            "out" | "wide" => Ok(Self::Out),
            "stop" => Ok(Self::Stop),
            other => Err(CodecError::invalid(format!("zoom direction '{other}'"))),
        }
    }
}

impl FromStr for FocusDirection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "near" => Ok(Self::Near),
            "far" => Ok(Self::Far),
            "stop" => Ok(Self::Stop),
            other => Err(CodecError::invalid(format!("focus direction '{other}'"))),
        }
    }
}

// MARK: - MotionCommand

/// Last commanded motion on a single axis.
///
/// Speeds are clamped into the axis range on construction and forced to 0
/// when the direction is `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "axis", rename_all = "lowercase")]
pub enum MotionCommand {
    Pan { direction: PanDirection, speed: u8 },
    Tilt { direction: TiltDirection, speed: u8 },
    Zoom { direction: ZoomDirection, speed: u8 },
    Focus { direction: FocusDirection, speed: u8 },
}

impl MotionCommand {
    pub fn pan(direction: PanDirection, speed: u8) -> Self {
        let speed = if direction.is_stop() { 0 } else { Axis::Pan.clamp_speed(speed) };
        Self::Pan { direction, speed }
    }

    pub fn tilt(direction: TiltDirection, speed: u8) -> Self {
        let speed = if direction.is_stop() { 0 } else { Axis::Tilt.clamp_speed(speed) };
        Self::Tilt { direction, speed }
    }

    pub fn zoom(direction: ZoomDirection, speed: u8) -> Self {
        let speed = if direction.is_stop() { 0 } else { Axis::Zoom.clamp_speed(speed) };
        Self::Zoom { direction, speed }
    }

    pub fn focus(direction: FocusDirection, speed: u8) -> Self {
        let speed = if direction.is_stop() { 0 } else { Axis::Focus.clamp_speed(speed) };
        Self::Focus { direction, speed }
    }

    /// The "all stopped" record for `axis`.
    pub fn stopped(axis: Axis) -> Self {
        match axis {
            Axis::Pan => Self::pan(PanDirection::Stop, 0),
            Axis::Tilt => Self::tilt(TiltDirection::Stop, 0),
            Axis::Zoom => Self::zoom(ZoomDirection::Stop, 0),
            Axis::Focus => Self::focus(FocusDirection::Stop, 0),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Self::Pan { .. } => Axis::Pan,
            Self::Tilt { .. } => Axis::Tilt,
            Self::Zoom { .. } => Axis::Zoom,
            Self::Focus { .. } => Axis::Focus,
        }
    }

    pub fn speed(&self) -> u8 {
        match self {
            Self::Pan { speed, .. }
            | Self::Tilt { speed, .. }
            | Self::Zoom { speed, .. }
            | Self::Focus { speed, .. } => *speed,
        }
    }

    pub fn is_stopped(&self) -> bool {
        match self {
            Self::Pan { direction, .. } => direction.is_stop(),
            Self::Tilt { direction, .. } => direction.is_stop(),
            Self::Zoom { direction, .. } => direction.is_stop(),
            Self::Focus { direction, .. } => direction.is_stop(),
        }
    }
}

// MARK: - PresetSlot

/// Number of preset buttons exposed to the operator.
pub const UI_PRESET_SLOTS: u8 = 5;
/// Highest device slot accepted. 255 is reserved on some firmwares.
pub const MAX_DEVICE_SLOT: u8 = 254;

/// Operator-facing preset slot (1..=5).
///
/// Device slots are zero-based: UI slot `n` is device slot `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PresetSlot(u8);

impl PresetSlot {
    pub fn new(ui_index: u8) -> Result<Self, CodecError> {
        if (1..=UI_PRESET_SLOTS).contains(&ui_index) {
            Ok(Self(ui_index))
        } else {
            Err(CodecError::invalid(format!(
                "preset slot {ui_index} outside 1..={UI_PRESET_SLOTS}"
            )))
        }
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn device_slot(&self) -> DeviceSlot {
        DeviceSlot(self.0 - 1)
    }
}

/// Camera-side preset memory number (0..=254).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceSlot(u8);

impl DeviceSlot {
    pub fn new(slot: u8) -> Result<Self, CodecError> {
        if slot <= MAX_DEVICE_SLOT {
            Ok(Self(slot))
        } else {
            Err(CodecError::invalid(format!(
                "device preset slot {slot} outside 0..={MAX_DEVICE_SLOT}"
            )))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

// MARK: - VideoFrame

/// Encoded image published by the video relay.
///
/// Frames are immutable once published; viewers share them through `Arc`.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// JPEG bytes, ready for multipart delivery.
    pub data: bytes::Bytes,
    /// Monotonically increasing across reconnects.
    pub sequence: u64,
    pub captured_at: Instant,
}

impl VideoFrame {
    pub fn new(data: bytes::Bytes, sequence: u64) -> Self {
        Self { data, sequence, captured_at: Instant::now() }
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }
}
