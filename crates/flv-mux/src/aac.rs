//! AAC audio tag body construction.
//!
//! FLV audio tag bodies start with a one-byte sound descriptor followed, for
//! AAC, by an AACAUDIODATA packet type byte and the payload. Defined by
//! video_file_format_spec_v10.pdf (Annex E.4.2.1 - AUDIODATA).

use bytes::{BufMut, Bytes, BytesMut};

/// SoundFormat nibble for AAC.
const SOUND_FORMAT_AAC: u8 = 10;
/// AACAUDIODATA packet types.
const AAC_PACKET_SEQUENCE_HEADER: u8 = 0;
const AAC_PACKET_RAW: u8 = 1;

/// The sound descriptor byte shared by every audio tag of one stream.
///
/// Players largely ignore the rate/size/channel bits for AAC (the
/// AudioSpecificConfig is authoritative) but the FLV spec still requires them
/// to describe the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFlags(u8);

impl SoundFlags {
    /// Derive the descriptor from stream characteristics.
    ///
    /// Sample rates map onto the four FLV sound-rate buckets (44.1 kHz and
    /// above share the top bucket, as the spec mandates for AAC).
    pub fn from_config(sample_rate: u32, sample_size: u32, stereo: bool) -> Self {
        let rate_bits: u8 = match sample_rate {
            0..=7350 => 0,
            7351..=14700 => 1,
            14701..=29400 => 2,
            _ => 3,
        };
        let size_bit: u8 = if sample_size > 8 { 1 } else { 0 };
        let stereo_bit: u8 = stereo as u8;

        Self((SOUND_FORMAT_AAC << 4) | (rate_bits << 2) | (size_bit << 1) | stereo_bit)
    }

    pub fn byte(self) -> u8 {
        self.0
    }
}

/// Build the body of an AAC sequence-header audio tag carrying the raw
/// AudioSpecificConfig. Must precede dependent raw-frame tags.
pub fn sequence_header_body(flags: SoundFlags, audio_specific_config: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(2 + audio_specific_config.len());
    body.put_u8(flags.byte());
    body.put_u8(AAC_PACKET_SEQUENCE_HEADER);
    body.put_slice(audio_specific_config);
    body.freeze()
}

/// Build the body of a raw AAC audio tag from one access unit.
pub fn raw_body(flags: SoundFlags, data: &Bytes) -> Bytes {
    let mut body = BytesMut::with_capacity(2 + data.len());
    body.put_u8(flags.byte());
    body.put_u8(AAC_PACKET_RAW);
    body.put_slice(data);
    body.freeze()
}
