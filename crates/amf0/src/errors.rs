use std::io;

use super::define::Amf0Marker;

/// Errors that can occur when reading encoded AMF0 data.
#[derive(Debug, thiserror::Error)]
pub enum Amf0ReadError {
    /// An unknown marker was encountered.
    #[error("unknown marker: {0}")]
    UnknownMarker(u8),
    /// A wrong type was encountered. Created when the next value is not the
    /// expected type.
    #[error("wrong type: expected {expected:?}, got {got:?}")]
    WrongType {
        /// The expected marker.
        expected: Amf0Marker,
        /// The marker actually found.
        got: Amf0Marker,
    },
    /// A string parse error occurred.
    #[error("string parse error: {0}")]
    StringParseError(#[from] std::str::Utf8Error),
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur when encoding AMF0 data.
#[derive(Debug, thiserror::Error)]
pub enum Amf0WriteError {
    /// A normal string was too long.
    #[error("normal string too long")]
    NormalStringTooLong,
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
