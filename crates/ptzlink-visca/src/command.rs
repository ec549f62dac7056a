//! Typed VISCA command families.
//!
//! Every family is built through a validating constructor, so a
//! [`ViscaCommand`] value can only hold parameters the camera accepts.
//! [`ViscaCommand::encode`] is therefore infallible.
//!
//! ```text
//! pan/tilt   81 01 06 01 VV WW PP TT FF   VV/WW speed (00 on a stopped axis)
//! home       81 01 06 04 FF
//! zoom       81 01 04 07 XX FF            2p in, 3p out, 00 stop
//! focus      81 01 04 08 XX FF            2p near, 3p far, 00 stop
//! autofocus  81 01 04 38 0M FF            02 on, 03 off
//! preset     81 01 04 3F OO SS FF         01 save, 02 recall
//! ```

use ptzlink_core::{
    CodecError, DeviceSlot, FocusDirection, PanDirection, TiltDirection, ZoomDirection,
    FOCUS_SPEED, PAN_TILT_SPEED, ZOOM_SPEED,
};

use crate::message::{MessageKind, ViscaMessage, HEADER_CAMERA_1, TERMINATOR};

const CMD: u8 = 0x01;
const CAT_PAN_TILTER: u8 = 0x06;
const CAT_CAMERA: u8 = 0x04;

const PT_DRIVE: u8 = 0x01;
const PT_HOME: u8 = 0x04;
const CAM_ZOOM: u8 = 0x07;
const CAM_FOCUS: u8 = 0x08;
const CAM_FOCUS_MODE: u8 = 0x38;
const CAM_MEMORY: u8 = 0x3F;

const AUTOFOCUS_ON: u8 = 0x02;
const AUTOFOCUS_OFF: u8 = 0x03;

const VARIABLE_FORWARD: u8 = 0x20;
const VARIABLE_REVERSE: u8 = 0x30;
const VARIABLE_STOP: u8 = 0x00;

// MARK: - Families

/// Pan/tilt drive. Speeds on a stopped axis are always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanTiltDrive {
    pan: PanDirection,
    tilt: TiltDirection,
    pan_speed: u8,
    tilt_speed: u8,
}

impl PanTiltDrive {
    pub fn pan(&self) -> PanDirection {
        self.pan
    }

    pub fn tilt(&self) -> TiltDirection {
        self.tilt
    }

    pub fn pan_speed(&self) -> u8 {
        self.pan_speed
    }

    pub fn tilt_speed(&self) -> u8 {
        self.tilt_speed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomDrive {
    direction: ZoomDirection,
    speed: u8,
}

impl ZoomDrive {
    pub fn direction(&self) -> ZoomDirection {
        self.direction
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusDrive {
    direction: FocusDirection,
    speed: u8,
}

impl FocusDrive {
    pub fn direction(&self) -> FocusDirection {
        self.direction
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetOp {
    Save,
    Recall,
}

impl PresetOp {
    fn code(&self) -> u8 {
        match self {
            PresetOp::Save => 0x01,
            PresetOp::Recall => 0x02,
        }
    }
}

// MARK: - ViscaCommand

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViscaCommand {
    PanTilt(PanTiltDrive),
    Home,
    Zoom(ZoomDrive),
    Focus(FocusDrive),
    Autofocus { enabled: bool },
    Preset { op: PresetOp, slot: DeviceSlot },
}

impl ViscaCommand {
    /// Pan/tilt drive. A moving axis needs a speed in 1..=24; the speed of a
    /// stopped axis is ignored and encoded as `00`.
    pub fn pan_tilt(
        pan: PanDirection,
        tilt: TiltDirection,
        pan_speed: u8,
        tilt_speed: u8,
    ) -> Result<Self, CodecError> {
        let pan_speed = drive_speed("pan", pan.is_stop(), pan_speed)?;
        let tilt_speed = drive_speed("tilt", tilt.is_stop(), tilt_speed)?;
        Ok(Self::PanTilt(PanTiltDrive { pan, tilt, pan_speed, tilt_speed }))
    }

    /// Both axes stopped: `81 01 06 01 00 00 03 03 FF`.
    pub fn pan_tilt_stop() -> Self {
        Self::PanTilt(PanTiltDrive {
            pan: PanDirection::Stop,
            tilt: TiltDirection::Stop,
            pan_speed: 0,
            tilt_speed: 0,
        })
    }

    pub fn zoom(direction: ZoomDirection, speed: u8) -> Result<Self, CodecError> {
        let speed = variable_speed("zoom", direction.is_stop(), speed, ZOOM_SPEED.end())?;
        Ok(Self::Zoom(ZoomDrive { direction, speed }))
    }

    pub fn focus(direction: FocusDirection, speed: u8) -> Result<Self, CodecError> {
        let speed = variable_speed("focus", direction.is_stop(), speed, FOCUS_SPEED.end())?;
        Ok(Self::Focus(FocusDrive { direction, speed }))
    }

    pub fn autofocus(enabled: bool) -> Self {
        Self::Autofocus { enabled }
    }

    pub fn preset_save(slot: DeviceSlot) -> Self {
        Self::Preset { op: PresetOp::Save, slot }
    }

    pub fn preset_recall(slot: DeviceSlot) -> Self {
        Self::Preset { op: PresetOp::Recall, slot }
    }

    pub fn encode(&self) -> ViscaMessage {
        let bytes = match self {
            Self::PanTilt(drive) => vec![
                HEADER_CAMERA_1,
                CMD,
                CAT_PAN_TILTER,
                PT_DRIVE,
                drive.pan_speed,
                drive.tilt_speed,
                drive.pan.code(),
                drive.tilt.code(),
                TERMINATOR,
            ],
            Self::Home => vec![HEADER_CAMERA_1, CMD, CAT_PAN_TILTER, PT_HOME, TERMINATOR],
            Self::Zoom(drive) => {
                let control = match drive.direction {
                    ZoomDirection::In => VARIABLE_FORWARD + drive.speed,
                    ZoomDirection::Out => VARIABLE_REVERSE + drive.speed,
                    ZoomDirection::Stop => VARIABLE_STOP,
                };
                vec![HEADER_CAMERA_1, CMD, CAT_CAMERA, CAM_ZOOM, control, TERMINATOR]
            }
            Self::Focus(drive) => {
                let control = match drive.direction {
                    FocusDirection::Near => VARIABLE_FORWARD + drive.speed,
                    FocusDirection::Far => VARIABLE_REVERSE + drive.speed,
                    FocusDirection::Stop => VARIABLE_STOP,
                };
                vec![HEADER_CAMERA_1, CMD, CAT_CAMERA, CAM_FOCUS, control, TERMINATOR]
            }
            Self::Autofocus { enabled } => {
                let mode = if *enabled { AUTOFOCUS_ON } else { AUTOFOCUS_OFF };
                vec![HEADER_CAMERA_1, CMD, CAT_CAMERA, CAM_FOCUS_MODE, mode, TERMINATOR]
            }
            Self::Preset { op, slot } => vec![
                HEADER_CAMERA_1,
                CMD,
                CAT_CAMERA,
                CAM_MEMORY,
                op.code(),
                slot.get(),
                TERMINATOR,
            ],
        };
        ViscaMessage::new(bytes, MessageKind::Command)
    }

    /// Recover the typed intent from an encoded command.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let body = match bytes {
            [HEADER_CAMERA_1, CMD, body @ .., TERMINATOR] => body,
            _ => {
                return Err(CodecError::malformed(format!(
                    "expected 81 01 … FF, got {}",
                    crate::hex_string(bytes)
                )))
            }
        };

        match body {
            [CAT_PAN_TILTER, PT_DRIVE, pan_speed, tilt_speed, pan, tilt] => {
                let pan = PanDirection::from_code(*pan)
                    .ok_or_else(|| CodecError::malformed(format!("pan code {pan:02X}")))?;
                let tilt = TiltDirection::from_code(*tilt)
                    .ok_or_else(|| CodecError::malformed(format!("tilt code {tilt:02X}")))?;
                if (pan.is_stop() && *pan_speed != 0) || (tilt.is_stop() && *tilt_speed != 0) {
                    return Err(CodecError::malformed("speed set on a stopped axis"));
                }
                Self::pan_tilt(pan, tilt, *pan_speed, *tilt_speed).map_err(as_malformed)
            }
            [CAT_PAN_TILTER, PT_HOME] => Ok(Self::Home),
            [CAT_CAMERA, CAM_ZOOM, control] => {
                let (direction, speed) = match split_variable(*control) {
                    Some((VARIABLE_FORWARD, speed)) => (ZoomDirection::In, speed),
                    Some((VARIABLE_REVERSE, speed)) => (ZoomDirection::Out, speed),
                    None => (ZoomDirection::Stop, 0),
                    Some(_) => {
                        return Err(CodecError::malformed(format!("zoom control {control:02X}")))
                    }
                };
                Self::zoom(direction, speed).map_err(as_malformed)
            }
            [CAT_CAMERA, CAM_FOCUS, control] => {
                let (direction, speed) = match split_variable(*control) {
                    Some((VARIABLE_FORWARD, speed)) => (FocusDirection::Near, speed),
                    Some((VARIABLE_REVERSE, speed)) => (FocusDirection::Far, speed),
                    None => (FocusDirection::Stop, 0),
                    Some(_) => {
                        return Err(CodecError::malformed(format!("focus control {control:02X}")))
                    }
                };
                Self::focus(direction, speed).map_err(as_malformed)
            }
            [CAT_CAMERA, CAM_FOCUS_MODE, AUTOFOCUS_ON] => Ok(Self::autofocus(true)),
            [CAT_CAMERA, CAM_FOCUS_MODE, AUTOFOCUS_OFF] => Ok(Self::autofocus(false)),
            [CAT_CAMERA, CAM_MEMORY, op, slot] => {
                let slot = DeviceSlot::new(*slot).map_err(as_malformed)?;
                match *op {
                    0x01 => Ok(Self::preset_save(slot)),
                    0x02 => Ok(Self::preset_recall(slot)),
                    other => Err(CodecError::malformed(format!("preset op {other:02X}"))),
                }
            }
            _ => Err(CodecError::malformed(format!(
                "unknown command {}",
                crate::hex_string(bytes)
            ))),
        }
    }
}

fn drive_speed(axis: &str, stopped: bool, speed: u8) -> Result<u8, CodecError> {
    if stopped {
        return Ok(0);
    }
    if PAN_TILT_SPEED.contains(&speed) {
        Ok(speed)
    } else {
        Err(CodecError::invalid(format!(
            "{axis} speed {speed} outside {}..={}",
            PAN_TILT_SPEED.start(),
            PAN_TILT_SPEED.end()
        )))
    }
}

fn variable_speed(what: &str, stopped: bool, speed: u8, max: &u8) -> Result<u8, CodecError> {
    if stopped {
        return Ok(0);
    }
    if speed <= *max {
        Ok(speed)
    } else {
        Err(CodecError::invalid(format!("{what} speed {speed} outside 0..={max}")))
    }
}

/// `2p`/`3p` → (high nibble, p). `00` → `None`.
fn split_variable(control: u8) -> Option<(u8, u8)> {
    if control == VARIABLE_STOP {
        None
    } else {
        Some((control & 0xF0, control & 0x0F))
    }
}

fn as_malformed(err: CodecError) -> CodecError {
    match err {
        CodecError::InvalidParameter { reason } => CodecError::MalformedCommand { reason },
        other => other,
    }
}
