//! AVC/H.264 video tag body construction.
//!
//! FLV video tag bodies start with a one-byte frame/codec descriptor followed
//! by an AVCVIDEOPACKET (packet type + 24-bit composition time + payload).
//! Defined by video_file_format_spec_v10.pdf (Annex E.4.3.1 - VIDEODATA).

use std::io;

use bytes::{BufMut, Bytes, BytesMut};

/// VideoData codec id for AVC.
const CODEC_ID_AVC: u8 = 7;
/// AVCVIDEOPACKET packet types.
const AVC_PACKET_SEQUENCE_HEADER: u8 = 0;
const AVC_PACKET_NALU: u8 = 1;

const FRAME_TYPE_KEY: u8 = 1;
const FRAME_TYPE_INTER: u8 = 2;

fn descriptor(is_keyframe: bool) -> u8 {
    let frame_type = if is_keyframe {
        FRAME_TYPE_KEY
    } else {
        FRAME_TYPE_INTER
    };
    (frame_type << 4) | CODEC_ID_AVC
}

/// Build the body of an AVC sequence-header video tag from raw SPS and PPS.
///
/// The payload is an AVCDecoderConfigurationRecord with a single SPS and a
/// single PPS; profile, compatibility and level are lifted from the SPS
/// itself. A conformant stream must emit this before the first dependent
/// keyframe tag.
pub fn sequence_header_body(sps: &[u8], pps: &[u8]) -> io::Result<Bytes> {
    if sps.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("SPS too short for configuration record: {} bytes", sps.len()),
        ));
    }
    if sps.len() > u16::MAX as usize || pps.len() > u16::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "SPS/PPS length exceeds u16 range",
        ));
    }

    let mut body = BytesMut::with_capacity(16 + sps.len() + pps.len());

    // Frame/codec descriptor: sequence headers are always marked keyframe.
    body.put_u8(descriptor(true));
    body.put_u8(AVC_PACKET_SEQUENCE_HEADER);
    // Composition time offset, always 0 for the configuration record.
    body.put_uint(0, 3);

    // AVCDecoderConfigurationRecord (ISO/IEC 14496-15 section 5.2.4.1)
    body.put_u8(1); // configurationVersion
    body.put_u8(sps[1]); // AVCProfileIndication
    body.put_u8(sps[2]); // profile_compatibility
    body.put_u8(sps[3]); // AVCLevelIndication
    body.put_u8(0xFF); // reserved (6 bits) + lengthSizeMinusOne = 3
    body.put_u8(0xE1); // reserved (3 bits) + numOfSequenceParameterSets = 1
    body.put_u16(sps.len() as u16);
    body.put_slice(sps);
    body.put_u8(1); // numOfPictureParameterSets
    body.put_u16(pps.len() as u16);
    body.put_slice(pps);

    Ok(body.freeze())
}

/// Build the body of an AVC NALU video tag.
///
/// `data` must already carry AVCC framing (every NALU prefixed by its 4-byte
/// big-endian length); the composition time offset is always written as 0.
pub fn nalu_body(is_keyframe: bool, data: &Bytes) -> Bytes {
    let mut body = BytesMut::with_capacity(5 + data.len());
    body.put_u8(descriptor(is_keyframe));
    body.put_u8(AVC_PACKET_NALU);
    body.put_uint(0, 3);
    body.put_slice(data);
    body.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_header_layout() {
        let sps = [0x67, 0x64, 0x00, 0x1F, 0xAC];
        let pps = [0x68, 0xEE, 0x3C, 0x80];

        let body = sequence_header_body(&sps, &pps).unwrap();

        // keyframe + AVC, sequence header packet, zero composition time
        assert_eq!(&body[..5], &[0x17, 0x00, 0x00, 0x00, 0x00]);
        // configuration record header lifted from the SPS
        assert_eq!(&body[5..11], &[0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1]);
        // SPS length + bytes
        assert_eq!(&body[11..13], &[0x00, 0x05]);
        assert_eq!(&body[13..18], &sps);
        // one PPS, length + bytes
        assert_eq!(&body[18..21], &[0x01, 0x00, 0x04]);
        assert_eq!(&body[21..], &pps);
    }

    #[test]
    fn test_sequence_header_rejects_short_sps() {
        let result = sequence_header_body(&[0x67, 0x64], &[0x68]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_nalu_body_keyframe_flag() {
        let data = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x65]);

        let key = nalu_body(true, &data);
        assert_eq!(&key[..5], &[0x17, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&key[5..], &data[..]);

        let inter = nalu_body(false, &data);
        assert_eq!(inter[0], 0x27);
    }
}
