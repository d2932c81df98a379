//! zstd compressed-content envelope

use std::io::Read;

use crate::{decode, encode, CodecError, CodecResult, CompressedContent, WireBytes};

pub const DEFAULT_LEVEL: i32 = 3;

/// Unwrap a msgpack `[length, zstd bytes]` envelope.
///
/// The declared length must match the decompressed size exactly. Output grows
/// with the frame, so an inflated length never reserves memory up front;
/// decoding stops one byte past the declared length.
pub fn decompress_envelope(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let envelope: CompressedContent = decode(bytes)?;
    let declared = envelope.length as u64;
    let mut payload = Vec::new();
    zstd::stream::read::Decoder::new(&envelope.data.0[..])
        .map_err(CodecError::Decompress)?
        .take(declared + 1)
        .read_to_end(&mut payload)
        .map_err(CodecError::Decompress)?;
    if payload.len() as u64 != declared {
        return Err(CodecError::LengthMismatch {
            declared: envelope.length,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

pub fn compress_envelope(payload: &[u8], level: i32) -> CodecResult<Vec<u8>> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        CodecError::Compress(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "payload exceeds 4 GiB",
        ))
    })?;
    let data = zstd::bulk::compress(payload, level).map_err(CodecError::Compress)?;
    encode(&CompressedContent {
        length,
        data: WireBytes(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let payload = b"schema contents ".repeat(64);
        let envelope = compress_envelope(&payload, DEFAULT_LEVEL).unwrap();
        assert!(envelope.len() < payload.len());
        assert_eq!(decompress_envelope(&envelope).unwrap(), payload);
    }

    #[test]
    fn test_short_declared_length_fails() {
        let payload = vec![7u8; 100];
        let data = zstd::bulk::compress(&payload, DEFAULT_LEVEL).unwrap();
        let envelope = encode(&CompressedContent {
            length: 10,
            data: WireBytes(data),
        })
        .unwrap();
        assert!(matches!(
            decompress_envelope(&envelope),
            Err(CodecError::LengthMismatch { declared: 10, .. })
        ));
    }

    #[test]
    fn test_long_declared_length_fails() {
        let payload = vec![7u8; 100];
        let data = zstd::bulk::compress(&payload, DEFAULT_LEVEL).unwrap();
        let envelope = encode(&CompressedContent {
            length: 200,
            data: WireBytes(data),
        })
        .unwrap();
        assert!(matches!(
            decompress_envelope(&envelope),
            Err(CodecError::LengthMismatch { declared: 200, actual: 100 })
        ));
    }

    #[test]
    fn test_huge_declared_length_is_not_trusted() {
        let payload = vec![7u8; 100];
        let data = zstd::bulk::compress(&payload, DEFAULT_LEVEL).unwrap();
        let envelope = encode(&CompressedContent {
            length: u32::MAX,
            data: WireBytes(data),
        })
        .unwrap();
        assert!(matches!(
            decompress_envelope(&envelope),
            Err(CodecError::LengthMismatch { declared: u32::MAX, actual: 100 })
        ));
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        let envelope = encode(&CompressedContent {
            length: 4,
            data: WireBytes(vec![1, 2, 3, 4]),
        })
        .unwrap();
        assert!(matches!(decompress_envelope(&envelope), Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decompress_envelope(&[0xc1, 0x00]).is_err());
    }
}
