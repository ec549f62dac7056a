//! Control facade over the VISCA session.
//!
//! [`CameraController`] is the only thing the HTTP layer calls for camera
//! control. It validates, encodes, hands the message to the session and,
//! once the camera has the command, updates [`CameraStateTracker`] and
//! [`PresetStore`]. It never touches the video relay.

pub mod controller;
pub mod presets;
pub mod state;

pub use controller::{CameraController, CommandReport, ControllerStatus, DeviceIdentity, Outcome};
pub use presets::{PresetRecord, PresetStore};
pub use state::{CameraState, CameraStateTracker};
