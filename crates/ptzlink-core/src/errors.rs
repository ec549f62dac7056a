use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtzError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Video source error: {0}")]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections raised before anything reaches the camera.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Malformed command: {reason}")]
    MalformedCommand { reason: String },
}

impl CodecError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCommand { reason: reason.into() }
    }
}

/// Socket-level failures. A missing acknowledgment is not one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Command session closed")]
    Closed,
}

impl TransportError {
    pub fn network(reason: impl std::fmt::Display) -> Self {
        Self::Network { reason: reason.to_string() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Video source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Video source ended the stream")]
    EndOfStream,
}

/// Failures surfaced by the control facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Malformed command: {reason}")]
    MalformedCommand { reason: String },

    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Command session closed")]
    Closed,
}

impl From<CodecError> for ControlError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidParameter { reason } => Self::InvalidParameter { reason },
            CodecError::MalformedCommand { reason } => Self::MalformedCommand { reason },
        }
    }
}

impl From<TransportError> for ControlError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network { reason } => Self::Network { reason },
            TransportError::Closed => Self::Closed,
        }
    }
}

impl ControlError {
    /// Caller mistakes, rejected before any I/O.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::MalformedCommand { .. })
    }
}
