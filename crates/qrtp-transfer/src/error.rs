//! Error types for frames, sessions and the audio backchannel.

use qrtp_header::HeaderError;
use thiserror::Error;

/// A frame or acknowledgment that could not be applied.
///
/// These come off a noisy channel. Sessions log them through their
/// [`TransferLogger`](crate::logging::TransferLogger) and carry on; they are
/// never returned to the caller of a session entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame does not start with \"{expected}\"")]
    PrefixMismatch { expected: String },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("index {index} outside declared total {total}")]
    OutOfRange { index: usize, total: usize },

    #[error("frame declares total {got}, transfer in progress has {expected}")]
    TotalMismatch { expected: usize, got: usize },

    #[error("frame declares total {declared}, receiver accepts at most {limit}")]
    TooLarge { declared: usize, limit: usize },

    #[error("payload carries {actual} characters, range needs {expected}")]
    PayloadLength { expected: usize, actual: usize },

    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Local misuse of a session API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("operation requires {expected} mode")]
    WrongMode { expected: &'static str },

    #[error("invalid protocol prefix \"{0}\"")]
    InvalidPrefix(String),

    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Failure of the audio collaborator carrying backchannel messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("message length {len} exceeds channel limit {max}")]
    TooLong { len: usize, max: usize },

    #[error("channel closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}
