//! AMF0 primitives for FLV script-data metadata.
//!
//! This crate provides the small slice of AMF0 that `onMetaData` tags use:
//! numbers, booleans, short strings and ECMA arrays. The encoder writes to any
//! [`std::io::Write`]; the [`Amf0FieldReader`] walks an already-encoded buffer
//! property by property so a caller can locate fixed-width value slots and
//! overwrite them without shifting bytes.
//!
//! ## License
//!
//! MIT License

mod define;
mod encode;
mod errors;
mod reader;

pub use crate::define::{Amf0Marker, Amf0Value};
pub use crate::encode::Amf0Encoder;
pub use crate::errors::{Amf0ReadError, Amf0WriteError};
pub use crate::reader::Amf0FieldReader;
