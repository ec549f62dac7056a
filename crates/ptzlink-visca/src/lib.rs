//! VISCA codec: typed commands in, byte-exact messages out.
//!
//! Everything here is pure. Range checks happen when a [`ViscaCommand`] is
//! built, so [`ViscaCommand::encode`] cannot fail and no message leaving this
//! crate carries an out-of-range parameter.

pub mod command;
pub mod framing;
pub mod message;
pub mod raw;
pub mod reply;

pub use command::{FocusDrive, PanTiltDrive, PresetOp, ViscaCommand, ZoomDrive};
pub use framing::{unwrap_reply, wrap, FramedReply};
pub use message::{hex_string, MessageKind, ViscaMessage};
pub use raw::parse_hex;
pub use reply::{ReplyError, ViscaReply};
