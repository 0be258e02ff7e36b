//! Read-back inspection of FLV files.
//!
//! Produces a human-readable report of a file's header, tag population and
//! `onMetaData` contents. This is a diagnostics collaborator, not part of
//! the muxing path; the integration tests also lean on it to verify written
//! files end to end.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;

use amf0::{Amf0FieldReader, Amf0Marker};
use byteorder::{BigEndian, ReadBytesExt};

use crate::tag::{FlvTagType, TAG_HEADER_SIZE};

/// A parsed tag summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSummary {
    pub tag_type: u8,
    pub data_size: u32,
    pub timestamp_ms: u32,
    pub offset: u64,
}

/// Walk every tag in `buf` (starting after the 13-byte preamble), returning
/// one summary per tag. Fails on truncated tags or backpointer mismatches.
pub fn scan_tags(buf: &[u8]) -> io::Result<Vec<TagSummary>> {
    if buf.len() < 13 || &buf[0..3] != b"FLV" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing FLV signature",
        ));
    }

    let mut reader = Cursor::new(&buf[13..]);
    let mut tags = Vec::new();

    while (reader.position() as usize) < buf.len() - 13 {
        let offset = 13 + reader.position();
        let tag_type = reader.read_u8()?;
        let data_size = reader.read_u24::<BigEndian>()?;
        let timestamp_ms = reader.read_u24::<BigEndian>()? | ((reader.read_u8()? as u32) << 24);
        let _stream_id = reader.read_u24::<BigEndian>()?;

        let mut body = vec![0u8; data_size as usize];
        reader.read_exact(&mut body)?;

        let backpointer = reader.read_u32::<BigEndian>()?;
        if backpointer != TAG_HEADER_SIZE as u32 + data_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "backpointer mismatch at offset {offset}: {backpointer} != {}",
                    TAG_HEADER_SIZE as u32 + data_size
                ),
            ));
        }

        tags.push(TagSummary {
            tag_type,
            data_size,
            timestamp_ms,
            offset,
        });
    }

    Ok(tags)
}

fn amf0_err(err: amf0::Amf0ReadError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

/// Render the key/value pairs of an `onMetaData` body as display lines.
fn describe_metadata(body: &[u8]) -> io::Result<Vec<String>> {
    let mut reader = Amf0FieldReader::new(body);
    reader.expect_marker(Amf0Marker::String).map_err(amf0_err)?;
    let name = reader.read_property_key().map_err(amf0_err)?;

    let mut lines = vec![format!("script name: {name}")];

    reader
        .expect_marker(Amf0Marker::EcmaArray)
        .map_err(amf0_err)?;
    let count = reader.read_array_len().map_err(amf0_err)?;

    for _ in 0..count {
        let key = reader.read_property_key().map_err(amf0_err)?;
        let marker = reader.read_marker().map_err(amf0_err)?;
        let slot = reader.position();
        let rendered = match marker {
            Amf0Marker::Number => {
                reader.skip(8).map_err(amf0_err)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&body[slot..slot + 8]);
                format!("{}", f64::from_be_bytes(raw))
            }
            Amf0Marker::Boolean => {
                reader.skip(1).map_err(amf0_err)?;
                format!("{}", body[slot] != 0)
            }
            Amf0Marker::String => {
                let len = reader.read_string_len().map_err(amf0_err)?;
                let slot = reader.position();
                reader.skip(len).map_err(amf0_err)?;
                String::from_utf8_lossy(&body[slot..slot + len]).into_owned()
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsupported metadata value marker: {other:?}"),
                ));
            }
        };
        lines.push(format!("  {key} = {rendered}"));
    }

    Ok(lines)
}

/// Read back `path` and produce a descriptive report of its contents.
pub fn describe_file(path: impl AsRef<Path>) -> io::Result<String> {
    let buf = fs::read(path.as_ref())?;
    let tags = scan_tags(&buf)?;

    let has_audio = buf[4] & 0x04 != 0;
    let has_video = buf[4] & 0x01 != 0;

    let mut report = String::new();
    let _ = writeln!(report, "FLV file: {}", path.as_ref().display());
    let _ = writeln!(
        report,
        "version {}, audio: {has_audio}, video: {has_video}, {} bytes",
        buf[3],
        buf.len()
    );

    let mut video = 0u32;
    let mut audio = 0u32;
    let mut script = 0u32;
    let mut last_ts = 0u32;
    for tag in &tags {
        match FlvTagType::try_from(tag.tag_type) {
            Ok(FlvTagType::Video) => video += 1,
            Ok(FlvTagType::Audio) => audio += 1,
            Ok(FlvTagType::ScriptData) => script += 1,
            Err(_) => {}
        }
        last_ts = last_ts.max(tag.timestamp_ms);
    }
    let _ = writeln!(
        report,
        "tags: {} ({video} video, {audio} audio, {script} script), last timestamp {last_ts} ms",
        tags.len()
    );

    // Show the first metadata tag's contents.
    if let Some(meta) = tags
        .iter()
        .find(|t| t.tag_type == u8::from(FlvTagType::ScriptData))
    {
        let start = meta.offset as usize + TAG_HEADER_SIZE;
        let body = &buf[start..start + meta.data_size as usize];
        for line in describe_metadata(body)? {
            let _ = writeln!(report, "{line}");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataConfig, StreamType, build_metadata};

    #[test]
    fn test_scan_rejects_garbage() {
        assert!(scan_tags(b"not an flv file at all").is_err());
    }

    #[test]
    fn test_scan_and_describe_metadata_tag() {
        let mut config = MetadataConfig::new(StreamType::VideoOnly);
        config.width = 640;
        config.height = 480;
        let tag = build_metadata(&config).unwrap();

        let mut file = Vec::new();
        file.extend_from_slice(b"FLV\x01\x01\x00\x00\x00\x09\x00\x00\x00\x00");
        file.extend_from_slice(&tag);

        let tags = scan_tags(&file).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_type, 18);
        assert_eq!(tags[0].offset, 13);

        let body = &file[13 + TAG_HEADER_SIZE..13 + TAG_HEADER_SIZE + tags[0].data_size as usize];
        let lines = describe_metadata(body).unwrap();
        assert_eq!(lines[0], "script name: onMetaData");
        assert!(lines.iter().any(|l| l.contains("width = 640")));
    }
}
