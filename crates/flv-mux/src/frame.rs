use bytes::Bytes;

/// One encoded video access unit.
///
/// `data` carries one or more NALUs, each prefixed by its own 4-byte
/// big-endian length (AVCC framing). Annex-B start codes are not accepted and
/// no conversion is performed; producers must emit AVCC directly.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub is_keyframe: bool,
    /// Capture timestamp in milliseconds. Ignored when the muxer synthesizes
    /// timestamps.
    pub timestamp_ms: u32,
    pub data: Bytes,
    /// Raw SPS bytes, set only when (re)emitting a sequence header.
    pub sps: Option<Bytes>,
    /// Raw PPS bytes, set only when (re)emitting a sequence header.
    pub pps: Option<Bytes>,
}

impl VideoFrame {
    pub fn new(is_keyframe: bool, timestamp_ms: u32, data: Bytes) -> Self {
        Self {
            is_keyframe,
            timestamp_ms,
            data,
            sps: None,
            pps: None,
        }
    }
}

/// One raw AAC access unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Capture timestamp in milliseconds. Ignored when the muxer synthesizes
    /// timestamps.
    pub timestamp_ms: u32,
    pub data: Bytes,
    /// Raw AudioSpecificConfig bytes, set only when emitting a sequence
    /// header.
    pub audio_specific_config: Option<Bytes>,
}

impl AudioFrame {
    pub fn new(timestamp_ms: u32, data: Bytes) -> Self {
        Self {
            timestamp_ms,
            data,
            audio_specific_config: None,
        }
    }
}
