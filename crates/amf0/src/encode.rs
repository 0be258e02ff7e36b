use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use super::define::Amf0Marker;
use super::{Amf0Value, Amf0WriteError};

/// A macro to encode an AMF property key into a buffer
#[macro_export]
macro_rules! write_amf_property_key {
    ($buffer:expr, $key:expr) => {
        // write key length (u16 in big endian)
        $buffer.write_u16::<BigEndian>($key.len() as u16)?;
        // write key string bytes
        $buffer.write_all($key.as_bytes())?;
    };
}

/// AMF0 encoder.
///
/// Allows for encoding AMF0 values to some writer.
pub struct Amf0Encoder;

impl Amf0Encoder {
    /// Encode a generic AMF0 value
    pub fn encode(writer: &mut impl io::Write, value: &Amf0Value) -> Result<(), Amf0WriteError> {
        match value {
            Amf0Value::Number(val) => Self::encode_number(writer, *val),
            Amf0Value::Boolean(val) => Self::encode_bool(writer, *val),
            Amf0Value::String(val) => Self::encode_string(writer, val),
        }
    }

    /// Encode an AMF0 number
    pub fn encode_number(writer: &mut impl io::Write, value: f64) -> Result<(), Amf0WriteError> {
        writer.write_u8(Amf0Marker::Number as u8)?;
        writer.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    /// Encode an AMF0 boolean
    pub fn encode_bool(writer: &mut impl io::Write, value: bool) -> Result<(), Amf0WriteError> {
        writer.write_u8(Amf0Marker::Boolean as u8)?;
        writer.write_u8(value as u8)?;
        Ok(())
    }

    /// Encode an AMF0 string
    pub fn encode_string(writer: &mut impl io::Write, value: &str) -> Result<(), Amf0WriteError> {
        if value.len() > (u16::MAX as usize) {
            return Err(Amf0WriteError::NormalStringTooLong);
        }

        writer.write_u8(Amf0Marker::String as u8)?;
        write_amf_property_key!(writer, value);
        Ok(())
    }

    /// Write the marker and element count that open an AMF0 ECMA array
    pub fn ecma_array_header(
        writer: &mut impl io::Write,
        count: u32,
    ) -> Result<(), Amf0WriteError> {
        writer.write_u8(Amf0Marker::EcmaArray as u8)?;
        writer.write_u32::<BigEndian>(count)?;
        Ok(())
    }

    /// Write object end marker to signify the end of an AMF0 object
    pub fn object_eof(writer: &mut impl io::Write) -> Result<(), Amf0WriteError> {
        writer.write_u24::<BigEndian>(Amf0Marker::ObjectEnd as u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_write_number() {
        let mut amf0_number = vec![0x00];
        amf0_number.extend_from_slice(&772.161_f64.to_be_bytes());

        let mut vec = Vec::<u8>::new();
        Amf0Encoder::encode_number(&mut vec, 772.161).unwrap();

        assert_eq!(vec, amf0_number);
    }

    #[test]
    fn test_write_boolean() {
        let mut vec = Vec::<u8>::new();
        Amf0Encoder::encode_bool(&mut vec, true).unwrap();
        assert_eq!(vec, vec![0x01, 0x01]);

        vec.clear();
        Amf0Encoder::encode_bool(&mut vec, false).unwrap();
        assert_eq!(vec, vec![0x01, 0x00]);
    }

    #[test]
    fn test_write_string() {
        let mut amf0_string = vec![0x02, 0x00, 0x0b];
        amf0_string.extend_from_slice(b"Hello World");

        let mut vec = Vec::<u8>::new();
        Amf0Encoder::encode_string(&mut vec, "Hello World").unwrap();

        assert_eq!(vec, amf0_string);
    }

    #[test]
    fn test_write_string_too_long() {
        let long_string = "a".repeat(u16::MAX as usize + 1);
        let mut vec = Vec::<u8>::new();
        let result = Amf0Encoder::encode_string(&mut vec, &long_string);
        assert!(matches!(result, Err(Amf0WriteError::NormalStringTooLong)));
    }

    #[test]
    fn test_write_ecma_array_header() {
        let mut vec = Vec::<u8>::new();
        Amf0Encoder::ecma_array_header(&mut vec, 3).unwrap();
        assert_eq!(vec, vec![0x08, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_write_object_eof() {
        let mut vec = Vec::<u8>::new();
        Amf0Encoder::object_eof(&mut vec).unwrap();
        assert_eq!(vec, vec![0x00, 0x00, 0x09]);
    }

    #[test]
    fn test_encode_generic() {
        let mut vec = Vec::<u8>::new();
        Amf0Encoder::encode(&mut vec, &Amf0Value::Number(1.0)).unwrap();
        Amf0Encoder::encode(&mut vec, &Amf0Value::Boolean(true)).unwrap();
        Amf0Encoder::encode(&mut vec, &Amf0Value::String(Cow::Borrowed("test"))).unwrap();

        let mut expected = vec![0x00];
        expected.extend_from_slice(&1.0_f64.to_be_bytes());
        expected.extend_from_slice(&[0x01, 0x01]);
        expected.extend_from_slice(&[0x02, 0x00, 0x04]);
        expected.extend_from_slice(b"test");
        assert_eq!(vec, expected);
    }
}
