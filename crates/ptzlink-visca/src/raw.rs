//! Manual-entry escape hatch: validates operator-typed hex.
//!
//! This is the only way to build a [`ViscaMessage`] from arbitrary bytes.
//! It backs the diagnostic hex terminal and nothing else; control paths go
//! through [`ViscaCommand`](crate::ViscaCommand).

use ptzlink_core::CodecError;

use crate::message::{MessageKind, ViscaMessage, HEADER_CAMERA_1, TERMINATOR};

/// Longest message accepted from the terminal (VISCA caps packets at 16 bytes).
pub const MAX_RAW_LEN: usize = 16;

/// Parse whitespace-separated two-digit hex bytes into a message.
///
/// The sequence must start with `81` and end with `FF`.
pub fn parse_hex(text: &str) -> Result<ViscaMessage, CodecError> {
    let mut bytes = Vec::new();
    for token in text.split_whitespace() {
        if token.len() != 2 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CodecError::malformed(format!("'{token}' is not a two-digit hex byte")));
        }
        let byte = u8::from_str_radix(token, 16)
            .map_err(|e| CodecError::malformed(format!("'{token}': {e}")))?;
        bytes.push(byte);
    }

    if bytes.len() < 3 {
        return Err(CodecError::malformed("need at least 3 bytes (81 .. FF)"));
    }
    if bytes.len() > MAX_RAW_LEN {
        return Err(CodecError::malformed(format!(
            "{} bytes exceeds the {MAX_RAW_LEN}-byte VISCA limit",
            bytes.len()
        )));
    }
    if bytes[0] != HEADER_CAMERA_1 {
        return Err(CodecError::malformed(format!("must start with 81, got {:02X}", bytes[0])));
    }
    if bytes[bytes.len() - 1] != TERMINATOR {
        return Err(CodecError::malformed("must end with FF"));
    }
    if bytes[1..bytes.len() - 1].contains(&TERMINATOR) {
        return Err(CodecError::malformed("FF may only appear as the terminator"));
    }

    let kind = if bytes[1] == 0x09 { MessageKind::Inquiry } else { MessageKind::Command };
    Ok(ViscaMessage::new(bytes, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_hex() {
        let msg = parse_hex("81 01 04 00 02 ff").unwrap();
        assert_eq!(msg.to_hex(), "81 01 04 00 02 FF");
        assert_eq!(msg.kind(), MessageKind::Command);

        let inq = parse_hex("  81\t09 00 02   FF ").unwrap();
        assert_eq!(inq.kind(), MessageKind::Inquiry);
    }

    #[test]
    fn rejects_malformed_hex() {
        for text in [
            "",
            "81 FF",
            "01 01 04 00 02 FF",
            "81 01 04 00 02",
            "81 1 04 FF",
            "81 01 0G FF",
            "8101 04 FF",
            "81 FF 04 FF",
            "81 01 04 00 00 00 00 00 00 00 00 00 00 00 00 00 FF",
        ] {
            assert!(
                matches!(parse_hex(text), Err(CodecError::MalformedCommand { .. })),
                "accepted {text:?}"
            );
        }
    }
}
