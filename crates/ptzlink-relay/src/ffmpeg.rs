//! RTSP ingest through an `ffmpeg` subprocess writing MJPEG to stdout.
//!
//! ```text
//! ffmpeg -rtsp_transport tcp -i <url> -vf scale=W:H -q:v Q -f mjpeg pipe:1
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ptzlink_core::config::VideoConfig;
use ptzlink_core::SourceError;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::source::{FrameSource, FrameStream};
use crate::splitter::JpegSplitter;

/// No bytes from ffmpeg for this long counts as a dead stream.
const STALL_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 64 * 1024;

pub struct FfmpegSource {
    binary: String,
    url: String,
    width: u32,
    height: u32,
    quality: u8,
}

impl FfmpegSource {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            binary: "ffmpeg".to_owned(),
            url: config.source_url.clone(),
            width: config.width,
            height: config.height,
            quality: config.jpeg_quality,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if self.url.starts_with("rtsp://") {
            args.extend(["-rtsp_transport".to_owned(), "tcp".to_owned()]);
        }
        args.extend([
            "-i".to_owned(),
            self.url.clone(),
            "-an".to_owned(),
            "-vf".to_owned(),
            format!("scale={}:{}", self.width, self.height),
            "-q:v".to_owned(),
            qscale(self.quality).to_string(),
            "-f".to_owned(),
            "mjpeg".to_owned(),
            "pipe:1".to_owned(),
        ]);
        args
    }
}

/// Map JPEG quality 1–100 onto ffmpeg's `-q:v` scale (2 best … 31 worst).
fn qscale(quality: u8) -> u8 {
    let quality = quality.clamp(1, 100) as u32;
    (2 + (100 - quality) * 29 / 99) as u8
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn open(&self) -> Result<Box<dyn FrameStream>, SourceError> {
        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::Unavailable {
                reason: format!("spawn {}: {e}", self.binary),
            })?;
        let stdout = child.stdout.take().ok_or_else(|| SourceError::Unavailable {
            reason: "ffmpeg stdout not captured".into(),
        })?;

        info!("ffmpeg ingest started for {} ({}x{})", self.url, self.width, self.height);
        Ok(Box::new(FfmpegStream {
            _child: child,
            stdout,
            splitter: JpegSplitter::new(),
            chunk: vec![0u8; READ_CHUNK],
        }))
    }

    fn describe(&self) -> String {
        format!("ffmpeg {}", self.url)
    }
}

struct FfmpegStream {
    // Killed on drop.
    _child: Child,
    stdout: ChildStdout,
    splitter: JpegSplitter,
    chunk: Vec<u8>,
}

#[async_trait]
impl FrameStream for FfmpegStream {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        loop {
            if let Some(frame) = self.splitter.next_frame() {
                return Ok(Some(frame));
            }
            let read = tokio::time::timeout(STALL_TIMEOUT, self.stdout.read(&mut self.chunk)).await;
            let n = match read {
                Err(_) => {
                    return Err(SourceError::Unavailable {
                        reason: format!("no data from ffmpeg for {}s", STALL_TIMEOUT.as_secs()),
                    })
                }
                Ok(Err(e)) => return Err(SourceError::Unavailable { reason: e.to_string() }),
                Ok(Ok(n)) => n,
            };
            if n == 0 {
                debug!("ffmpeg closed stdout");
                return Ok(None);
            }
            self.splitter.push(&self.chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rtsp_command_line() {
        let source = FfmpegSource::new(&VideoConfig::default());
        let args = source.args();
        let joined = args.join(" ");
        assert!(joined.contains("-rtsp_transport tcp -i rtsp://192.168.1.11/1/h264major"));
        assert!(joined.contains("-vf scale=640:360"));
        assert!(joined.ends_with("-f mjpeg pipe:1"));
    }

    #[test]
    fn non_rtsp_inputs_skip_transport_flag() {
        let config = VideoConfig { source_url: "/tmp/clip.mp4".into(), ..VideoConfig::default() };
        let args = FfmpegSource::new(&config).args();
        assert!(!args.iter().any(|a| a == "-rtsp_transport"));
    }

    #[test]
    fn quality_maps_onto_qscale() {
        assert_eq!(qscale(100), 2);
        assert_eq!(qscale(1), 31);
        assert_eq!(qscale(75), 9);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let source = FfmpegSource::new(&VideoConfig::default())
            .with_binary("/nonexistent/ptzlink-ffmpeg");
        assert!(matches!(source.open().await, Err(SourceError::Unavailable { .. })));
    }
}
