use std::fmt;

use bytes::Bytes;

/// Address byte for "to camera 1".
pub const HEADER_CAMERA_1: u8 = 0x81;
/// Every VISCA message ends with this byte.
pub const TERMINATOR: u8 = 0xFF;

/// Distinguishes commands from inquiries (VISCA-over-IP uses different
/// payload types for them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Inquiry,
}

// ── ViscaMessage ──────────────────────────────────────────────────────────────

/// A well-formed VISCA byte sequence, `81 … FF`.
///
/// There is no public constructor taking bytes: messages come from
/// [`ViscaCommand::encode`](crate::ViscaCommand::encode), the inquiry
/// constructors below, or the raw-hex validator in [`crate::raw`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ViscaMessage {
    bytes: Bytes,
    kind: MessageKind,
}

impl ViscaMessage {
    pub(crate) fn new(bytes: Vec<u8>, kind: MessageKind) -> Self {
        debug_assert!(bytes.len() >= 3);
        debug_assert_eq!(bytes.first(), Some(&HEADER_CAMERA_1));
        debug_assert_eq!(bytes.last(), Some(&TERMINATOR));
        Self { bytes: Bytes::from(bytes), kind }
    }

    /// `CAM_VersionInq`. Side-effect free, used to probe reachability.
    pub fn version_inquiry() -> Self {
        Self::new(vec![HEADER_CAMERA_1, 0x09, 0x00, 0x02, TERMINATOR], MessageKind::Inquiry)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Spaced uppercase hex, e.g. `81 01 04 07 25 FF`.
    pub fn to_hex(&self) -> String {
        hex_string(&self.bytes)
    }
}

impl fmt::Debug for ViscaMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViscaMessage({})", self.to_hex())
    }
}

impl fmt::Display for ViscaMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Format bytes as spaced uppercase hex.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equal_messages_hash_together() {
        let mut seen = HashSet::new();
        assert!(seen.insert(ViscaMessage::version_inquiry()));
        assert!(!seen.insert(ViscaMessage::version_inquiry()));
        assert!(seen.insert(ViscaMessage::new(
            vec![HEADER_CAMERA_1, 0x09, 0x00, 0x02, TERMINATOR],
            MessageKind::Command,
        )));
        assert_eq!(seen.len(), 2);
    }
}
