use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use super::{Amf0Marker, Amf0ReadError};

/// A positional reader over an encoded AMF0 property list.
///
/// Unlike a full decoder this never materializes values; it only walks
/// markers, keys and value payloads while exposing the byte position of each.
/// That is exactly what an in-place patcher needs: after [`read_marker`]
/// returns, [`position`] points at the first byte of the value payload, so a
/// fixed-width slot can be overwritten in a copy of the buffer without any
/// resizing.
///
/// [`read_marker`]: Amf0FieldReader::read_marker
/// [`position`]: Amf0FieldReader::position
pub struct Amf0FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Amf0FieldReader<'a> {
    /// Create a new field reader over the given buffer.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }

    /// Current byte offset into the buffer.
    pub const fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Check if the reader has consumed the whole buffer.
    pub const fn is_empty(&self) -> bool {
        self.cursor.get_ref().len() == self.cursor.position() as usize
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Amf0ReadError> {
        let pos = self.cursor.position() as usize;
        let buf = *self.cursor.get_ref();
        if pos + len > buf.len() {
            return Err(Amf0ReadError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            )));
        }
        self.cursor.seek(SeekFrom::Current(len as i64))?;
        Ok(&buf[pos..pos + len])
    }

    /// Advance past `len` bytes of value payload.
    pub fn skip(&mut self, len: usize) -> Result<(), Amf0ReadError> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read a property key (u16 big-endian length + UTF-8 bytes).
    pub fn read_property_key(&mut self) -> Result<&'a str, Amf0ReadError> {
        let len = self.cursor.read_u16::<BigEndian>()?;
        let bytes = self.read_bytes(len as usize)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// Read the next value marker byte.
    pub fn read_marker(&mut self) -> Result<Amf0Marker, Amf0ReadError> {
        let marker = self.cursor.read_u8()?;
        Amf0Marker::from_u8(marker).ok_or(Amf0ReadError::UnknownMarker(marker))
    }

    /// Read the next marker and check it against the expected one.
    pub fn expect_marker(&mut self, expected: Amf0Marker) -> Result<(), Amf0ReadError> {
        let got = self.read_marker()?;
        if got != expected {
            return Err(Amf0ReadError::WrongType { expected, got });
        }
        Ok(())
    }

    /// Read the u16 length prefix of a string value, leaving the reader at
    /// the first byte of the string payload.
    pub fn read_string_len(&mut self) -> Result<usize, Amf0ReadError> {
        Ok(self.cursor.read_u16::<BigEndian>()? as usize)
    }

    /// Read the u32 element count of an ECMA array, after its marker.
    pub fn read_array_len(&mut self) -> Result<u32, Amf0ReadError> {
        Ok(self.cursor.read_u32::<BigEndian>()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::{BigEndian, WriteBytesExt};

    use super::*;
    use crate::{Amf0Encoder, write_amf_property_key};

    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        let encode = |buf: &mut Vec<u8>| -> Result<(), crate::Amf0WriteError> {
            Amf0Encoder::ecma_array_header(buf, 2)?;
            write_amf_property_key!(buf, "duration");
            Amf0Encoder::encode_number(buf, 12.5)?;
            write_amf_property_key!(buf, "stereo");
            Amf0Encoder::encode_bool(buf, true)?;
            Amf0Encoder::object_eof(buf)?;
            Ok(())
        };
        encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_walk_property_list() {
        let buf = sample();
        let mut reader = Amf0FieldReader::new(&buf);

        reader.expect_marker(Amf0Marker::EcmaArray).unwrap();
        assert_eq!(reader.read_array_len().unwrap(), 2);

        assert_eq!(reader.read_property_key().unwrap(), "duration");
        reader.expect_marker(Amf0Marker::Number).unwrap();
        let slot = reader.position();
        assert_eq!(&buf[slot..slot + 8], &12.5_f64.to_be_bytes());
        reader.skip(8).unwrap();

        assert_eq!(reader.read_property_key().unwrap(), "stereo");
        reader.expect_marker(Amf0Marker::Boolean).unwrap();
        assert_eq!(buf[reader.position()], 0x01);
        reader.skip(1).unwrap();

        // trailing object end marker
        reader.skip(3).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_expect_marker_mismatch() {
        let buf = vec![Amf0Marker::Boolean as u8, 0x01];
        let mut reader = Amf0FieldReader::new(&buf);
        let err = reader.expect_marker(Amf0Marker::Number).unwrap_err();
        assert!(matches!(
            err,
            Amf0ReadError::WrongType {
                expected: Amf0Marker::Number,
                got: Amf0Marker::Boolean,
            }
        ));
    }

    #[test]
    fn test_unknown_marker() {
        let buf = vec![0xFF];
        let mut reader = Amf0FieldReader::new(&buf);
        assert!(matches!(
            reader.read_marker(),
            Err(Amf0ReadError::UnknownMarker(0xFF))
        ));
    }

    #[test]
    fn test_truncated_buffer() {
        let buf = vec![0x00, 0x04, b'a'];
        let mut reader = Amf0FieldReader::new(&buf);
        assert!(reader.read_property_key().is_err());
    }
}
