//! MJPEG delivery of the relay's latest frame.
//!
//! Each viewer gets its own task that watches the relay slot and writes
//! `multipart/x-mixed-replace` parts into a small channel. A slow viewer
//! fills its own channel and simply skips frames; the relay never waits.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use ptzlink_relay::{pick_frame, VideoRelay};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Boundary string used to separate MJPEG frames.
pub const MJPEG_BOUNDARY: &str = "ptzlink_frame_4d1c";

/// While no live frame exists, repeat the placeholder this often.
const PLACEHOLDER_INTERVAL: Duration = Duration::from_millis(500);

/// Parts buffered per viewer.
const VIEWER_BUFFER: usize = 2;

/// Format one multipart section around a JPEG.
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Stream the relay to one viewer until it disconnects.
pub fn stream_response(relay: Arc<VideoRelay>, placeholder: Bytes) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(VIEWER_BUFFER);
    let mut slot_rx = relay.subscribe();
    let staleness = relay.staleness();

    tokio::spawn(async move {
        let mut last_sequence = None;
        loop {
            let picked = {
                let slot = slot_rx.borrow_and_update();
                pick_frame(&slot, staleness)
            };
            let jpeg = match picked {
                Ok(frame) if Some(frame.sequence) != last_sequence => {
                    last_sequence = Some(frame.sequence);
                    Some(frame.data.clone())
                }
                Ok(_) => None,
                Err(_) => {
                    last_sequence = None;
                    Some(placeholder.clone())
                }
            };
            if let Some(jpeg) = jpeg {
                if tx.send(Ok(encode_part(&jpeg))).await.is_err() {
                    break;
                }
            }
            tokio::select! {
                changed = slot_rx.changed() => if changed.is_err() { break },
                _ = tokio::time::sleep(PLACEHOLDER_INTERVAL) => {}
            }
        }
        debug!("MJPEG viewer disconnected");
    });

    let headers = [
        (header::CONTENT_TYPE, format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}")),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_owned()),
        (header::PRAGMA, "no-cache".to_owned()),
    ];
    (StatusCode::OK, headers, Body::from_stream(ReceiverStream::new(rx))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_has_headers_and_trailer() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("--ptzlink_frame_4d1c\r\nContent-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 4\r\n\r\n"));
        assert!(part.ends_with(&[0xFF, 0xD9, b'\r', b'\n']));
    }
}
