//! Synchronous FLV container writer.
//!
//! [`TagWriter`] owns the byte-level layout: the 9-byte file header with its
//! zero backpointer, tag headers with the 24-bit + extended timestamp split,
//! and the PreviousTagSize field after every tag. It tracks its own append
//! cursor so the muxer can record tag offsets and rewrite earlier bytes
//! without losing its position.

use std::io::{Seek, SeekFrom, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::MuxError;
use crate::tag::{FlvTagType, MAX_TAG_DATA_SIZE, PREV_TAG_SIZE, TAG_HEADER_SIZE};

pub struct TagWriter<W: Write + Seek> {
    writer: W,
    /// Append cursor: total bytes written at the end of the file.
    position: u64,
}

impl<W: Write + Seek> TagWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
        }
    }

    /// Current end-of-file append position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write the FLV file signature, header and the initial zero
    /// PreviousTagSize field. Returns the number of bytes written (13).
    pub fn write_header(&mut self, has_audio: bool, has_video: bool) -> Result<usize, MuxError> {
        self.writer.write_all(b"FLV")?;
        self.writer.write_u8(1)?;

        // Flags: bit 2 for audio, bit 0 for video.
        let mut flags = 0_u8;
        if has_audio {
            flags |= 0x04;
        }
        if has_video {
            flags |= 0x01;
        }
        self.writer.write_u8(flags)?;

        // Data offset, always 9 for a standard header.
        self.writer.write_u32::<BigEndian>(9)?;
        // PreviousTagSize before the first tag is 0.
        self.writer.write_u32::<BigEndian>(0)?;

        self.position += 13;
        Ok(13)
    }

    /// Write one complete tag: header, body and trailing PreviousTagSize.
    /// Returns the number of bytes appended.
    pub fn write_tag(
        &mut self,
        tag_type: FlvTagType,
        data: &[u8],
        timestamp_ms: u32,
    ) -> Result<usize, MuxError> {
        if data.len() > MAX_TAG_DATA_SIZE {
            return Err(MuxError::TagTooLarge(data.len()));
        }
        let data_size = data.len() as u32;

        self.writer.write_u8(tag_type.into())?;
        self.writer.write_u24::<BigEndian>(data_size)?;
        // Timestamp is 24 bits plus one extended byte for bits 24-31.
        self.writer.write_u24::<BigEndian>(timestamp_ms & 0xFFFFFF)?;
        self.writer.write_u8((timestamp_ms >> 24) as u8)?;
        // Stream ID is always 0.
        self.writer.write_u24::<BigEndian>(0)?;

        self.writer.write_all(data)?;

        self.writer
            .write_u32::<BigEndian>(TAG_HEADER_SIZE as u32 + data_size)?;

        let written = TAG_HEADER_SIZE + data.len() + PREV_TAG_SIZE;
        self.position += written as u64;
        Ok(written)
    }

    /// Append a prebuilt tag that already carries its header and
    /// PreviousTagSize field, e.g. a metadata tag from the codec.
    pub fn write_prebuilt_tag(&mut self, tag: &[u8]) -> Result<usize, MuxError> {
        self.writer.write_all(tag)?;
        self.position += tag.len() as u64;
        Ok(tag.len())
    }

    /// Overwrite `bytes` at an earlier offset, then restore the append
    /// cursor so subsequent writes keep appending at the old end-of-file.
    pub fn rewrite_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), MuxError> {
        self.writer.flush()?;
        self.writer
            .seek(SeekFrom::Start(offset))
            .map_err(MuxError::Seek)?;
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        self.writer
            .seek(SeekFrom::Start(self.position))
            .map_err(MuxError::Seek)?;
        Ok(())
    }

    /// Flushes any buffered data to the underlying writer.
    pub fn flush(&mut self) -> Result<(), MuxError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the writer, flushing leftover buffered data first.
    pub fn into_inner(mut self) -> Result<W, MuxError> {
        self.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_write_header() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        let written = writer.write_header(true, true).unwrap();
        assert_eq!(written, 13);
        assert_eq!(writer.position(), 13);

        let buffer = writer.into_inner().unwrap().into_inner();
        assert_eq!(&buffer[0..3], b"FLV");
        assert_eq!(buffer[3], 0x01);
        // audio + video flags
        assert_eq!(buffer[4], 0x05);
        assert_eq!(&buffer[5..9], &[0x00, 0x00, 0x00, 0x09]);
        assert_eq!(&buffer[9..13], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_write_tag_layout() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(false, true).unwrap();

        let written = writer
            .write_tag(FlvTagType::Video, &[0xAA, 0xBB, 0xCC, 0xDD], 100)
            .unwrap();
        assert_eq!(written, TAG_HEADER_SIZE + 4 + PREV_TAG_SIZE);

        let buffer = writer.into_inner().unwrap().into_inner();
        let tag = &buffer[13..];
        assert_eq!(
            tag,
            &[
                0x09, // video
                0x00, 0x00, 0x04, // data size
                0x00, 0x00, 0x64, // timestamp
                0x00, // extended timestamp
                0x00, 0x00, 0x00, // stream id
                0xAA, 0xBB, 0xCC, 0xDD, // body
                0x00, 0x00, 0x00, 0x0F, // backpointer: 11 + 4
            ]
        );
    }

    #[test]
    fn test_extended_timestamp_byte() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(false, true).unwrap();
        writer
            .write_tag(FlvTagType::Video, &[0x01], 0x12345678)
            .unwrap();

        let buffer = writer.into_inner().unwrap().into_inner();
        // lower 24 bits first, then the upper byte
        assert_eq!(&buffer[17..21], &[0x34, 0x56, 0x78, 0x12]);
    }

    #[test]
    fn test_tag_too_large() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(false, true).unwrap();
        let oversized = vec![0u8; MAX_TAG_DATA_SIZE + 1];
        assert!(matches!(
            writer.write_tag(FlvTagType::Video, &oversized, 0),
            Err(MuxError::TagTooLarge(_))
        ));
    }

    #[test]
    fn test_rewrite_preserves_append_cursor() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(false, true).unwrap();
        writer.write_tag(FlvTagType::Video, &[0x00; 8], 0).unwrap();
        let end = writer.position();

        writer.rewrite_at(13, &[0xFF; 4]).unwrap();
        assert_eq!(writer.position(), end);

        // Appending afterwards lands at the old end-of-file.
        writer.write_tag(FlvTagType::Video, &[0x01], 40).unwrap();
        let buffer = writer.into_inner().unwrap().into_inner();
        assert_eq!(&buffer[13..17], &[0xFF; 4]);
        assert_eq!(buffer[end as usize], 0x09);
    }
}
