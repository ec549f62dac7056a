use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::PtzError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ptz_config.json";

// MARK: - PtzConfig

/// Static startup configuration. Loaded once, never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtzConfig {
    pub camera: CameraConfig,
    pub control: ControlConfig,
    pub video: VideoConfig,
    pub http: HttpConfig,
}

impl Default for PtzConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            control: ControlConfig::default(),
            video: VideoConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Datagram framing used on the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Bare VISCA bytes, `81 … FF`.
    Raw,
    /// VISCA-over-IP: 8-byte payload header in front of every message.
    ViscaOverIp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    #[serde(alias = "camIp", alias = "cam_ip")]
    pub host: String,
    #[serde(alias = "camPort", alias = "cam_port")]
    pub port: u16,
    pub framing: Framing,
    #[serde(alias = "deviceId")]
    pub device_id: String,
    #[serde(alias = "firmwareVersion")]
    pub firmware_version: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.11".to_owned(),
            port: 52381,
            framing: Framing::Raw,
            device_id: "3301432581P2107".to_owned(),
            firmware_version: "V1.3.81".to_owned(),
        }
    }
}

impl CameraConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// How long to wait for an acknowledgment after each send.
    #[serde(alias = "timeoutMs")]
    pub timeout_ms: u64,
    #[serde(alias = "queueDepth")]
    pub queue_depth: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { timeout_ms: 500, queue_depth: 8 }
    }
}

impl ControlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackend {
    Ffmpeg,
    Gstreamer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    #[serde(alias = "rtspUrl", alias = "rtsp_url", alias = "rtsp")]
    pub source_url: String,
    pub backend: VideoBackend,
    pub width: u32,
    pub height: u32,
    #[serde(alias = "jpegQuality")]
    pub jpeg_quality: u8,
    /// Frames older than this are never handed to viewers.
    #[serde(alias = "stalenessMs")]
    pub staleness_ms: u64,
    #[serde(alias = "initialBackoffMs")]
    pub initial_backoff_ms: u64,
    #[serde(alias = "maxBackoffMs")]
    pub max_backoff_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source_url: "rtsp://192.168.1.11/1/h264major".to_owned(),
            backend: VideoBackend::Ffmpeg,
            width: 640,
            height: 360,
            jpeg_quality: 75,
            staleness_ms: 2_000,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
        }
    }
}

impl VideoConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:5007".to_owned() }
    }
}

impl PtzConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, PtzError> {
        let config: Self = serde_json::from_str(json).map_err(|e| PtzError::ConfigurationInvalid {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load(path: &Path) -> Result<Self, PtzError> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        info!("Config loaded from {}: camera {}", path.display(), config.camera.socket_addr());
        Ok(config)
    }

    /// Apply `PTZLINK_*` overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), PtzError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PTZLINK_CAMERA_HOST") {
            self.camera.host = host;
        }
        if let Some(port) = lookup("PTZLINK_CAMERA_PORT") {
            self.camera.port = port.parse().map_err(|_| PtzError::ConfigurationInvalid {
                reason: format!("PTZLINK_CAMERA_PORT '{port}' is not a port number"),
            })?;
        }
        if let Some(url) = lookup("PTZLINK_RTSP_URL") {
            self.video.source_url = url;
        }
        if let Some(bind) = lookup("PTZLINK_HTTP_BIND") {
            self.http.bind = bind;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), PtzError> {
        let invalid = |reason: &str| {
            Err(PtzError::ConfigurationInvalid { reason: reason.to_owned() })
        };
        if self.camera.host.trim().is_empty() {
            return invalid("camera.host is empty");
        }
        if self.camera.port == 0 {
            return invalid("camera.port must be non-zero");
        }
        if self.control.queue_depth == 0 {
            return invalid("control.queue_depth must be at least 1");
        }
        if self.video.staleness_ms == 0 {
            return invalid("video.staleness_ms must be non-zero");
        }
        if self.video.initial_backoff_ms == 0
            || self.video.initial_backoff_ms > self.video.max_backoff_ms
        {
            return invalid("video backoff must satisfy 0 < initial_backoff_ms <= max_backoff_ms");
        }
        if !(1..=100).contains(&self.video.jpeg_quality) {
            return invalid("video.jpeg_quality must be within 1..=100");
        }
        Ok(())
    }
}
