//! RTSP ingest through GStreamer (`--features gstreamer`).
//!
//! # Pipeline
//! ```text
//! rtspsrc → decodebin → videoconvert → videoscale → video/x-raw,W×H → jpegenc → appsink
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use ptzlink_core::config::VideoConfig;
use ptzlink_core::SourceError;
use tracing::info;

use crate::source::{FrameSource, FrameStream};

/// Longest wait for one sample before the stream is considered dead.
const PULL_TIMEOUT_SECS: u64 = 5;

pub struct GstRtspSource {
    url: String,
    width: u32,
    height: u32,
    quality: u8,
}

impl GstRtspSource {
    pub fn new(config: &VideoConfig) -> Result<Self, SourceError> {
        gst::init().map_err(|e| SourceError::Pipeline(e.to_string()))?;
        Ok(Self {
            url: config.source_url.clone(),
            width: config.width,
            height: config.height,
            quality: config.jpeg_quality,
        })
    }

    fn pipeline_description(&self) -> String {
        format!(
            "rtspsrc location={url} latency=0 protocols=tcp \
             ! decodebin \
             ! videoconvert \
             ! videoscale \
             ! video/x-raw,width={width},height={height} \
             ! jpegenc quality={quality} \
             ! appsink name=sink sync=false max-buffers=2 drop=true",
            url = self.url,
            width = self.width,
            height = self.height,
            quality = self.quality,
        )
    }
}

#[async_trait]
impl FrameSource for GstRtspSource {
    async fn open(&self) -> Result<Box<dyn FrameStream>, SourceError> {
        let description = self.pipeline_description();
        let stream = tokio::task::spawn_blocking(move || GstStream::start(&description))
            .await
            .map_err(|e| SourceError::Pipeline(e.to_string()))??;
        info!("GStreamer ingest started for {} ({}x{})", self.url, self.width, self.height);
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("gstreamer {}", self.url)
    }
}

struct GstStream {
    pipeline: gst::Pipeline,
    appsink: AppSink,
}

impl GstStream {
    fn start(description: &str) -> Result<Self, SourceError> {
        let pipeline = gst::parse::launch(description)
            .map_err(|e| SourceError::Pipeline(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| SourceError::Pipeline("Not a pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| SourceError::Pipeline("No appsink".into()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|_| SourceError::Unavailable { reason: "Failed to start pipeline".into() })?;

        Ok(Self { pipeline, appsink })
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[async_trait]
impl FrameStream for GstStream {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        let appsink = self.appsink.clone();
        // `try_pull_sample` blocks.
        tokio::task::spawn_blocking(move || {
            let Some(sample) = appsink.try_pull_sample(gst::ClockTime::from_seconds(PULL_TIMEOUT_SECS))
            else {
                if appsink.is_eos() {
                    return Ok(None);
                }
                return Err(SourceError::Unavailable {
                    reason: format!("no frame for {PULL_TIMEOUT_SECS}s"),
                });
            };
            let buffer = sample
                .buffer_owned()
                .ok_or_else(|| SourceError::Pipeline("no buffer in sample".into()))?;
            let map = buffer
                .map_readable()
                .map_err(|_| SourceError::Pipeline("read map failed".into()))?;
            Ok(Some(Bytes::copy_from_slice(map.as_slice())))
        })
        .await
        .map_err(|e| SourceError::Pipeline(e.to_string()))?
    }
}
