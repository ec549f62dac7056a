//! Classification of datagrams coming back from the camera.
//!
//! ```text
//! 90 4y FF        ack         (y = socket)
//! 90 5y FF        completion  (also inquiry answers: 90 50 … FF)
//! 90 6y EE FF     error       (EE = error code)
//! ```

use std::fmt;

/// Error codes defined for VISCA error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    MessageLength,
    Syntax,
    BufferFull,
    Cancelled,
    NoSocket,
    NotExecutable,
    Other(u8),
}

impl ReplyError {
    fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::MessageLength,
            0x02 => Self::Syntax,
            0x03 => Self::BufferFull,
            0x04 => Self::Cancelled,
            0x05 => Self::NoSocket,
            0x41 => Self::NotExecutable,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageLength => write!(f, "message length error"),
            Self::Syntax => write!(f, "syntax error"),
            Self::BufferFull => write!(f, "command buffer full"),
            Self::Cancelled => write!(f, "command cancelled"),
            Self::NoSocket => write!(f, "no socket"),
            Self::NotExecutable => write!(f, "command not executable"),
            Self::Other(code) => write!(f, "error code {code:02X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViscaReply {
    Ack { socket: u8 },
    Completion { socket: u8 },
    Error { socket: u8, error: ReplyError },
    Unknown,
}

impl ViscaReply {
    /// Classify a bare VISCA reply (framing already removed).
    pub fn classify(bytes: &[u8]) -> Self {
        match bytes {
            [address, kind, rest @ ..] if address & 0xF0 == 0x90 => {
                let socket = kind & 0x0F;
                match kind & 0xF0 {
                    0x40 => Self::Ack { socket },
                    0x50 => Self::Completion { socket },
                    0x60 => {
                        let code = rest.first().copied().unwrap_or(0xFF);
                        Self::Error { socket, error: ReplyError::from_code(code) }
                    }
                    _ => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ViscaReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack { socket } => write!(f, "ack (socket {socket})"),
            Self::Completion { socket } => write!(f, "completion (socket {socket})"),
            Self::Error { socket, error } => write!(f, "error (socket {socket}): {error}"),
            Self::Unknown => write!(f, "unrecognised reply"),
        }
    }
}
