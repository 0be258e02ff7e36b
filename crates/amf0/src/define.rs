use std::borrow::Cow;

use num_derive::FromPrimitive;

/// AMF0 marker types used by FLV script data.
/// Defined in amf0_spec_121207.pdf section 2.1
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum Amf0Marker {
    /// number-marker (8-byte big-endian double)
    Number = 0x00,
    /// boolean-marker (1 byte)
    Boolean = 0x01,
    /// string-marker (u16 length + UTF-8 bytes)
    String = 0x02,
    /// object-marker
    Object = 0x03,
    /// null-marker
    Null = 0x05,
    /// ecma-array-marker (u32 count + key/value pairs)
    EcmaArray = 0x08,
    /// object-end-marker
    ObjectEnd = 0x09,
    /// strict-array-marker
    StrictArray = 0x0a,
}

/// The scalar AMF0 values an `onMetaData` property can carry.
#[derive(PartialEq, Clone, Debug)]
pub enum Amf0Value<'a> {
    /// Number Type defined section 2.2
    Number(f64),
    /// Boolean Type defined section 2.3
    Boolean(bool),
    /// String Type defined section 2.4
    String(Cow<'a, str>),
}

impl Amf0Value<'_> {
    /// Get the marker of the value.
    pub fn marker(&self) -> Amf0Marker {
        match self {
            Self::Number(_) => Amf0Marker::Number,
            Self::Boolean(_) => Amf0Marker::Boolean,
            Self::String(_) => Amf0Marker::String,
        }
    }

    /// Get the owned value.
    pub fn to_owned(&self) -> Amf0Value<'static> {
        match self {
            Self::Number(n) => Amf0Value::Number(*n),
            Self::Boolean(b) => Amf0Value::Boolean(*b),
            Self::String(s) => Amf0Value::String(Cow::Owned(s.to_string())),
        }
    }
}
