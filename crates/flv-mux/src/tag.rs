/// FLV Tag Type
///
/// Defined by:
/// - video_file_format_spec_v10.pdf (Chapter 1 - The FLV File Format - FLV tags)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio = 8,
    Video = 9,
    ScriptData = 18,
}

impl From<FlvTagType> for u8 {
    fn from(value: FlvTagType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for FlvTagType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(FlvTagType::Audio),
            9 => Ok(FlvTagType::Video),
            18 => Ok(FlvTagType::ScriptData),
            other => Err(other),
        }
    }
}

/// Size of the FLV file header.
pub const FLV_HEADER_SIZE: usize = 9;
/// Size of a tag header (type + data size + timestamp + stream id).
pub const TAG_HEADER_SIZE: usize = 11;
/// Size of the PreviousTagSize field following every tag.
pub const PREV_TAG_SIZE: usize = 4;
/// Maximum allowed data size for a single FLV tag payload (24 bits).
pub const MAX_TAG_DATA_SIZE: usize = 0xFFFFFF;
