//! VISCA-over-IP payload header (Sony port 52381).
//!
//! ```text
//! [type: u16 BE][length: u16 BE][sequence: u32 BE][VISCA bytes…]
//! ```
//!
//! `0x0100` carries a command, `0x0110` an inquiry and `0x0111` a reply.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::message::{MessageKind, ViscaMessage};

pub const HEADER_LEN: usize = 8;

pub const PAYLOAD_COMMAND: u16 = 0x0100;
pub const PAYLOAD_INQUIRY: u16 = 0x0110;
pub const PAYLOAD_REPLY: u16 = 0x0111;

/// Prefix `msg` with a VISCA-over-IP header.
pub fn wrap(msg: &ViscaMessage, sequence: u32) -> Bytes {
    let payload_type = match msg.kind() {
        MessageKind::Command => PAYLOAD_COMMAND,
        MessageKind::Inquiry => PAYLOAD_INQUIRY,
    };
    let mut buf = BytesMut::with_capacity(HEADER_LEN + msg.len());
    buf.put_u16(payload_type);
    buf.put_u16(msg.len() as u16);
    buf.put_u32(sequence);
    buf.put_slice(msg.as_bytes());
    buf.freeze()
}

/// A reply datagram with its header removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedReply {
    pub sequence: u32,
    pub payload: Bytes,
}

/// Strip a VISCA-over-IP reply header. Returns `None` for anything that is
/// not a complete reply frame.
pub fn unwrap_reply(datagram: &[u8]) -> Option<FramedReply> {
    if datagram.len() < HEADER_LEN {
        return None;
    }
    let mut header = &datagram[..HEADER_LEN];
    let payload_type = header.get_u16();
    let length = header.get_u16() as usize;
    let sequence = header.get_u32();

    if payload_type != PAYLOAD_REPLY || datagram.len() < HEADER_LEN + length {
        return None;
    }
    Some(FramedReply {
        sequence,
        payload: Bytes::copy_from_slice(&datagram[HEADER_LEN..HEADER_LEN + length]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ViscaCommand;

    #[test]
    fn wraps_commands_and_inquiries() {
        let home = ViscaCommand::Home.encode();
        assert_eq!(
            wrap(&home, 7).as_ref(),
            &[0x01, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x07, 0x81, 0x01, 0x06, 0x04, 0xFF]
        );

        let inq = wrap(&ViscaMessage::version_inquiry(), 0x0102_0304);
        assert_eq!(&inq[..8], &[0x01, 0x10, 0x00, 0x05, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn unwraps_reply_frames() {
        let datagram = [0x01, 0x11, 0x00, 0x03, 0x00, 0x00, 0x00, 0x2A, 0x90, 0x41, 0xFF];
        let reply = unwrap_reply(&datagram).unwrap();
        assert_eq!(reply.sequence, 42);
        assert_eq!(reply.payload.as_ref(), &[0x90, 0x41, 0xFF]);
    }

    #[test]
    fn rejects_truncated_or_foreign_frames() {
        assert!(unwrap_reply(&[0x01, 0x11, 0x00]).is_none());
        assert!(unwrap_reply(&[0x01, 0x11, 0x00, 0x05, 0, 0, 0, 1, 0x90, 0x41, 0xFF]).is_none());
        assert!(unwrap_reply(&[0x01, 0x00, 0x00, 0x03, 0, 0, 0, 1, 0x90, 0x41, 0xFF]).is_none());
    }
}
