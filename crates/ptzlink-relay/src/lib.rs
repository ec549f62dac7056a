//! Video relay: one pull loop, one frame slot, many viewers.
//!
//! # Flow
//! ```text
//! camera RTSP ──► FrameSource (ffmpeg | gstreamer) ──► pull loop ──► watch slot
//!                        ▲                                 │            │
//!                        └──── reconnect, 1 s → 10 s ◄─────┘     latest_frame()
//! ```

#[cfg(feature = "gstreamer")]
pub mod gst;

pub mod ffmpeg;
pub mod placeholder;
pub mod relay;
pub mod source;
pub mod splitter;
pub mod stats;

use std::sync::Arc;

use ptzlink_core::config::VideoConfig;
use ptzlink_core::{SourceError, VideoBackend};

pub use ffmpeg::FfmpegSource;
pub use placeholder::blank_jpeg;
pub use relay::{pick_frame, FrameUnavailable, RelayOptions, RelaySlot, VideoRelay};
pub use source::{FrameSource, FrameStream};
pub use splitter::JpegSplitter;
pub use stats::{RelayState, StreamStats};

/// Build the source selected by `config.backend`.
pub fn source_from_config(config: &VideoConfig) -> Result<Arc<dyn FrameSource>, SourceError> {
    match config.backend {
        VideoBackend::Ffmpeg => Ok(Arc::new(FfmpegSource::new(config))),
        #[cfg(feature = "gstreamer")]
        VideoBackend::Gstreamer => Ok(Arc::new(gst::GstRtspSource::new(config)?)),
        #[cfg(not(feature = "gstreamer"))]
        VideoBackend::Gstreamer => {
            tracing::warn!("Built without the `gstreamer` feature, using ffmpeg ingest");
            Ok(Arc::new(FfmpegSource::new(config)))
        }
    }
}
