use std::io;

use thiserror::Error;

/// Errors reported by the muxer and the metadata codec.
///
/// Every failing operation reports exactly once: synchronous calls through
/// their `Result`, queued asynchronous calls through the error hook installed
/// at open time. The muxer never retries on its own.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("failed to open output file: {0}")]
    FileOpen(io::Error),
    #[error("write failed: {0}")]
    Write(#[from] io::Error),
    #[error("seek failed: {0}")]
    Seek(io::Error),
    #[error("invalid metadata patch: {0}")]
    InvalidMetadataPatch(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("AMF0 encode error: {0}")]
    Amf0Write(#[from] amf0::Amf0WriteError),
    #[error("tag data size too large: {0}")]
    TagTooLarge(usize),
    #[error("writer queue disconnected")]
    QueueClosed,
}

impl MuxError {
    /// Stable machine-readable code for callers that dispatch on error kind.
    pub fn code(&self) -> &'static str {
        match self {
            MuxError::FileOpen(_) => "file_open_failure",
            MuxError::Write(_) => "write_failure",
            MuxError::Seek(_) => "seek_failure",
            MuxError::InvalidMetadataPatch(_) => "invalid_metadata_patch",
            MuxError::InvalidState(_) => "invalid_state",
            MuxError::Amf0Write(_) => "amf0_write_failure",
            MuxError::TagTooLarge(_) => "tag_too_large",
            MuxError::QueueClosed => "queue_closed",
        }
    }
}
