pub mod config;
pub mod errors;
pub mod types;

pub use config::{Framing, PtzConfig, VideoBackend};
pub use errors::{CodecError, ControlError, PtzError, SourceError, TransportError};
pub use types::*;
