//! Cuts a concatenated MJPEG byte stream into single JPEG images.
//!
//! ```text
//! … FF D8 <image data> FF D9 FF D8 <image data> FF D9 …
//!   └─── frame ───────────┘ └─── frame ───────────┘
//! ```

use bytes::{Buf, Bytes, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Frames larger than this are treated as garbage and dropped.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct JpegSplitter {
    buf: BytesMut,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete JPEG, if the buffer holds one.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let Some(start) = find(&self.buf, &SOI, 0) else {
                // Keep a trailing 0xFF: it may be the first half of a marker.
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                let discard = self.buf.len() - keep;
                self.buf.advance(discard);
                return None;
            };
            self.buf.advance(start);

            match find(&self.buf, &EOI, SOI.len()) {
                Some(end) => return Some(self.buf.split_to(end + EOI.len()).freeze()),
                None if self.buf.len() > MAX_FRAME_BYTES => {
                    tracing::warn!("Dropping {} bytes without JPEG end marker", self.buf.len());
                    self.buf.advance(SOI.len());
                }
                None => return None,
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
