//! `onMetaData` script tag construction and offset-stable patching.
//!
//! The builder and the patcher share one ordered field layout derived from a
//! [`MetadataConfig`]. Every numeric field is encoded as an 8-byte big-endian
//! double regardless of its logical type; that uniform width is what makes
//! the later in-place duration backfill safe. The patcher walks the same key
//! order the builder produced and only ever overwrites value bytes, never
//! shifting or resizing anything.

use std::borrow::Cow;
use std::io::Write;

use amf0::{Amf0Encoder, Amf0FieldReader, Amf0Marker, Amf0Value, write_amf_property_key};
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;

use crate::error::MuxError;
use crate::tag::{FlvTagType, MAX_TAG_DATA_SIZE, TAG_HEADER_SIZE};

/// Which elementary streams the FLV file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    AudioVideo,
    VideoOnly,
    AudioOnly,
}

impl StreamType {
    pub fn has_video(self) -> bool {
        matches!(self, StreamType::AudioVideo | StreamType::VideoOnly)
    }

    pub fn has_audio(self) -> bool {
        matches!(self, StreamType::AudioVideo | StreamType::AudioOnly)
    }
}

/// A dynamically-typed custom metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl MetaValue {
    fn as_amf0(&self) -> Amf0Value<'_> {
        match self {
            MetaValue::Number(n) => Amf0Value::Number(*n),
            MetaValue::Bool(b) => Amf0Value::Boolean(*b),
            MetaValue::Text(s) => Amf0Value::String(Cow::Borrowed(s)),
        }
    }
}

/// Descriptor of the stream characteristics serialized into `onMetaData`.
///
/// The writer never observes ad-hoc mutations of a caller-held config; the
/// file only changes through explicit `write_metadata`/`rewrite_metadata`
/// calls that take the config by reference at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataConfig {
    pub stream_type: StreamType,
    /// Seconds. A placeholder at open time, authoritative only after the
    /// final patch performed by `close`.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub video_codec_id: u32,
    pub audio_sample_rate: u32,
    pub audio_sample_size: u32,
    pub audio_codec_id: u32,
    pub channels: u32,
    pub stereo: bool,
    custom_fields: Vec<(String, MetaValue)>,
}

impl MetadataConfig {
    /// A config with the usual live-capture defaults: AVC video, 16-bit
    /// stereo AAC at 44.1 kHz.
    pub fn new(stream_type: StreamType) -> Self {
        Self {
            stream_type,
            duration: 0.0,
            width: 0,
            height: 0,
            framerate: 25,
            video_codec_id: 7,
            audio_sample_rate: 44100,
            audio_sample_size: 16,
            audio_codec_id: 10,
            channels: 2,
            stereo: true,
            custom_fields: Vec::new(),
        }
    }

    /// Upsert a custom metadata field.
    ///
    /// Replacing an existing name keeps its position; a new name is appended.
    /// The resulting order is load-bearing: it is the serialization order the
    /// builder emits and the exact key sequence the patcher expects to find.
    pub fn set_custom_field(&mut self, name: impl Into<String>, value: MetaValue) {
        let name = name.into();
        match self.custom_fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.custom_fields.push((name, value)),
        }
    }

    /// The custom fields in insertion order.
    pub fn custom_fields(&self) -> &[(String, MetaValue)] {
        &self.custom_fields
    }

    /// The complete ordered field layout: duration first, then the fields
    /// applicable to the stream type, then custom fields in insertion order.
    fn ordered_fields(&self) -> Vec<(&str, Amf0Value<'_>)> {
        let mut fields: Vec<(&str, Amf0Value)> =
            vec![("duration", Amf0Value::Number(self.duration))];

        if self.stream_type.has_video() {
            fields.push(("width", Amf0Value::Number(self.width as f64)));
            fields.push(("height", Amf0Value::Number(self.height as f64)));
            fields.push(("framerate", Amf0Value::Number(self.framerate as f64)));
            fields.push(("videocodecid", Amf0Value::Number(self.video_codec_id as f64)));
        }

        if self.stream_type.has_audio() {
            fields.push((
                "audiosamplerate",
                Amf0Value::Number(self.audio_sample_rate as f64),
            ));
            fields.push((
                "audiosamplesize",
                Amf0Value::Number(self.audio_sample_size as f64),
            ));
            fields.push(("audiocodecid", Amf0Value::Number(self.audio_codec_id as f64)));
            fields.push(("audiochannels", Amf0Value::Number(self.channels as f64)));
            fields.push(("stereo", Amf0Value::Boolean(self.stereo)));
        }

        for (name, value) in &self.custom_fields {
            fields.push((name.as_str(), value.as_amf0()));
        }

        fields
    }
}

/// Build a complete `onMetaData` script-data tag, including the 11-byte tag
/// header and the trailing 4-byte PreviousTagSize field.
pub fn build_metadata(config: &MetadataConfig) -> Result<Bytes, MuxError> {
    let fields = config.ordered_fields();

    let mut body = Vec::with_capacity(64 + fields.len() * 24);
    Amf0Encoder::encode_string(&mut body, crate::AMF0_ON_METADATA)?;
    Amf0Encoder::ecma_array_header(&mut body, fields.len() as u32)?;
    for (key, value) in &fields {
        write_amf_property_key!(&mut body, key);
        Amf0Encoder::encode(&mut body, value)?;
    }
    Amf0Encoder::object_eof(&mut body)?;

    if body.len() > MAX_TAG_DATA_SIZE {
        return Err(MuxError::TagTooLarge(body.len()));
    }

    let mut tag = Vec::with_capacity(TAG_HEADER_SIZE + body.len() + 4);
    tag.write_u8(FlvTagType::ScriptData.into())?;
    tag.write_u24::<BigEndian>(body.len() as u32)?;
    // Timestamp (24-bit + extended byte) and stream id are always 0.
    tag.write_u32::<BigEndian>(0)?;
    tag.write_u24::<BigEndian>(0)?;
    tag.extend_from_slice(&body);
    // The trailing backpointer holds this tag's header + body length.
    tag.write_u32::<BigEndian>((TAG_HEADER_SIZE + body.len()) as u32)?;

    Ok(Bytes::from(tag))
}

fn patch_err(err: amf0::Amf0ReadError) -> MuxError {
    MuxError::InvalidMetadataPatch(err.to_string())
}

/// Rewrite the field values of an existing metadata tag in place.
///
/// `existing` must be a tag previously produced by [`build_metadata`] for a
/// config with the same field layout. The returned buffer always has exactly
/// the same length as the input; only value bytes inside fixed-width slots
/// are replaced. Any layout mismatch (missing key, marker mismatch, string
/// width change, truncation) yields [`MuxError::InvalidMetadataPatch`] and
/// the caller's bytes stay untouched.
pub fn patch_metadata(existing: &[u8], config: &MetadataConfig) -> Result<Vec<u8>, MuxError> {
    if existing.len() < TAG_HEADER_SIZE || existing[0] != u8::from(FlvTagType::ScriptData) {
        return Err(MuxError::InvalidMetadataPatch(
            "buffer is not a script-data tag".into(),
        ));
    }

    let fields = config.ordered_fields();
    let mut patched = existing.to_vec();
    let mut reader = Amf0FieldReader::new(existing);

    reader.skip(TAG_HEADER_SIZE).map_err(patch_err)?;

    reader.expect_marker(Amf0Marker::String).map_err(patch_err)?;
    let name = reader.read_property_key().map_err(patch_err)?;
    if name != crate::AMF0_ON_METADATA {
        return Err(MuxError::InvalidMetadataPatch(format!(
            "unexpected script tag name: {name}"
        )));
    }

    reader
        .expect_marker(Amf0Marker::EcmaArray)
        .map_err(patch_err)?;
    let count = reader.read_array_len().map_err(patch_err)?;
    if count as usize != fields.len() {
        return Err(MuxError::InvalidMetadataPatch(format!(
            "field count mismatch: tag has {count}, config has {}",
            fields.len()
        )));
    }

    for (key, value) in &fields {
        let found = reader.read_property_key().map_err(patch_err)?;
        if found != *key {
            return Err(MuxError::InvalidMetadataPatch(format!(
                "field not found: expected {key}, got {found}"
            )));
        }

        reader.expect_marker(value.marker()).map_err(patch_err)?;
        let slot = reader.position();
        match value {
            Amf0Value::Number(n) => {
                patched[slot..slot + 8].copy_from_slice(&n.to_be_bytes());
                reader.skip(8).map_err(patch_err)?;
            }
            Amf0Value::Boolean(b) => {
                patched[slot] = *b as u8;
                reader.skip(1).map_err(patch_err)?;
            }
            Amf0Value::String(s) => {
                let stored_len = reader.read_string_len().map_err(patch_err)?;
                if stored_len != s.len() {
                    return Err(MuxError::InvalidMetadataPatch(format!(
                        "string width mismatch for {key}: stored {stored_len}, new {}",
                        s.len()
                    )));
                }
                let slot = reader.position();
                patched[slot..slot + stored_len].copy_from_slice(s.as_bytes());
                reader.skip(stored_len).map_err(patch_err)?;
            }
        }
    }

    // The field walk must land exactly on the end-of-object marker.
    let pos = reader.position();
    if existing.len() < pos + 3 || existing[pos..pos + 3] != [0x00, 0x00, 0x09] {
        return Err(MuxError::InvalidMetadataPatch(
            "missing object end marker after last field".into(),
        ));
    }

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::PREV_TAG_SIZE;

    fn av_config() -> MetadataConfig {
        let mut config = MetadataConfig::new(StreamType::AudioVideo);
        config.width = 1280;
        config.height = 720;
        config.framerate = 30;
        config
    }

    #[test]
    fn test_build_tag_framing() {
        let tag = build_metadata(&av_config()).unwrap();

        assert_eq!(tag[0], 18);
        let body_len =
            ((tag[1] as usize) << 16) | ((tag[2] as usize) << 8) | tag[3] as usize;
        assert_eq!(tag.len(), TAG_HEADER_SIZE + body_len + PREV_TAG_SIZE);
        // timestamp + extended + stream id all zero
        assert_eq!(&tag[4..11], &[0, 0, 0, 0, 0, 0, 0]);
        // backpointer covers header + body
        let back = u32::from_be_bytes(tag[tag.len() - 4..].try_into().unwrap());
        assert_eq!(back as usize, TAG_HEADER_SIZE + body_len);
        // body opens with the AMF0 string "onMetaData"
        assert_eq!(&tag[11..14], &[0x02, 0x00, 0x0A]);
        assert_eq!(&tag[14..24], b"onMetaData");
    }

    #[test]
    fn test_field_order_follows_stream_type() {
        let video_only = build_metadata(&MetadataConfig::new(StreamType::VideoOnly)).unwrap();
        let audio_only = build_metadata(&MetadataConfig::new(StreamType::AudioOnly)).unwrap();

        let video_str = String::from_utf8_lossy(&video_only).into_owned();
        assert!(video_str.contains("videocodecid"));
        assert!(!video_str.contains("audiocodecid"));

        let audio_str = String::from_utf8_lossy(&audio_only).into_owned();
        assert!(audio_str.contains("audiocodecid"));
        assert!(!audio_str.contains("videocodecid"));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let config = av_config();
        let built = build_metadata(&config).unwrap();
        let patched = patch_metadata(&built, &config).unwrap();
        assert_eq!(&built[..], &patched[..]);
    }

    #[test]
    fn test_patch_backfills_duration() {
        let mut config = av_config();
        config.set_custom_field("encoder", MetaValue::Text("lavf61".into()));
        let built = build_metadata(&config).unwrap();

        config.duration = 12.34;
        let patched = patch_metadata(&built, &config).unwrap();

        assert_eq!(patched.len(), built.len());
        // A fresh build with the updated config must agree byte for byte.
        let rebuilt = build_metadata(&config).unwrap();
        assert_eq!(&patched[..], &rebuilt[..]);
    }

    #[test]
    fn test_patch_rejects_unknown_custom_field() {
        let config = av_config();
        let built = build_metadata(&config).unwrap();

        let mut other = config.clone();
        other.set_custom_field("encoder", MetaValue::Text("x".into()));

        let err = patch_metadata(&built, &other).unwrap_err();
        assert!(matches!(err, MuxError::InvalidMetadataPatch(_)));
    }

    #[test]
    fn test_patch_rejects_string_width_change() {
        let mut config = av_config();
        config.set_custom_field("encoder", MetaValue::Text("lavf61".into()));
        let built = build_metadata(&config).unwrap();

        config.set_custom_field("encoder", MetaValue::Text("obs-studio-30".into()));
        let err = patch_metadata(&built, &config).unwrap_err();
        assert!(matches!(err, MuxError::InvalidMetadataPatch(_)));

        // Same width is fine and replaces in place.
        config.set_custom_field("encoder", MetaValue::Text("lavf62".into()));
        let patched = patch_metadata(&built, &config).unwrap();
        assert_eq!(patched.len(), built.len());
        assert!(String::from_utf8_lossy(&patched).contains("lavf62"));
    }

    #[test]
    fn test_patch_rejects_foreign_buffer() {
        let config = av_config();
        assert!(matches!(
            patch_metadata(&[0u8; 4], &config),
            Err(MuxError::InvalidMetadataPatch(_))
        ));

        let mut built = build_metadata(&config).unwrap().to_vec();
        built[0] = 9; // video tag type
        assert!(matches!(
            patch_metadata(&built, &config),
            Err(MuxError::InvalidMetadataPatch(_))
        ));
    }

    #[test]
    fn test_set_custom_field_upsert_preserves_position() {
        let mut config = MetadataConfig::new(StreamType::AudioVideo);
        config.set_custom_field("a", MetaValue::Number(1.0));
        config.set_custom_field("b", MetaValue::Bool(true));
        config.set_custom_field("a", MetaValue::Number(2.0));

        assert_eq!(
            config.custom_fields(),
            &[
                ("a".to_string(), MetaValue::Number(2.0)),
                ("b".to_string(), MetaValue::Bool(true)),
            ]
        );
    }
}
