use async_trait::async_trait;
use bytes::Bytes;
use ptzlink_core::SourceError;

/// Something that can be (re)connected to and yields encoded frames.
///
/// The relay calls [`open`](FrameSource::open) again after every failure, so
/// implementations keep no connection state of their own.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FrameStream>, SourceError>;

    /// Short description for logs, e.g. the stream URL.
    fn describe(&self) -> String;
}

/// One live connection to a source.
#[async_trait]
pub trait FrameStream: Send {
    /// Next JPEG frame. `Ok(None)` means the source ended the stream.
    async fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError>;
}
