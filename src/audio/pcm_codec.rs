//! PCM transport codec for the live session.
//!
//! - Outbound: raw f32 samples → clipped 16-bit signed LE PCM → base64,
//!   tagged with the fixed 16 kHz input rate.
//! - Inbound: base64 → 16-bit signed LE PCM @ 24 kHz mono → f32 in [-1, 1].

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::SessionError;

/// Sample rate of outbound microphone audio.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of inbound model audio.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// MIME descriptor attached to outbound audio chunks.
pub fn input_mime_type() -> String {
    format!("audio/pcm;rate={}", INPUT_SAMPLE_RATE)
}

/// Encode one block of f32 samples to the transport encoding.
///
/// Conversion is total: out-of-range samples are clipped, never rejected.
/// The 32768 scale matches the decoder's, so a round trip stays within
/// one quantization step even at the clipped +1.0 extreme.
pub fn encode_block(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clipped = (s * 32768.0).clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&clipped.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode an inbound base64 audio chunk into playable f32 samples.
///
/// Fails on invalid base64 or a truncated (odd-length) byte sequence; the
/// caller logs and skips the chunk without tearing down playback.
pub fn decode_chunk(data: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| SessionError::Decode(format!("invalid base64: {}", e)))?;

    if bytes.len() % 2 != 0 {
        bail!(SessionError::Decode(format!(
            "truncated PCM payload: {} bytes",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_quantization_error() {
        let original: Vec<f32> = (0..256)
            .map(|i| ((i as f32) * 0.05).sin() * 0.8)
            .collect();
        let encoded = encode_block(&original);
        let decoded = decode_chunk(&encoded).unwrap();

        assert_eq!(decoded.len(), original.len());
        for (a, b) in original.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0 + 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn full_scale_extremes_stay_within_one_step() {
        let decoded = decode_chunk(&encode_block(&[1.0, -1.0, 0.5])).unwrap();
        assert!((decoded[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[1] + 1.0).abs() < 1e-6);
        assert!((decoded[2] - 0.5).abs() <= 1.0 / 32768.0);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let encoded = encode_block(&[2.0, -2.0]);
        let decoded = decode_chunk(&encoded).unwrap();
        assert!((decoded[0] - 32767.0 / 32768.0).abs() < 1e-4);
        assert!((decoded[1] + 32767.0 / 32768.0).abs() < 1e-4);
    }

    #[test]
    fn empty_block_round_trips() {
        assert!(decode_chunk(&encode_block(&[])).unwrap().is_empty());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        // Three bytes cannot hold whole i16 samples.
        let b64 = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let err = decode_chunk(&b64).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(decode_chunk("not base64 !!!").is_err());
    }

    #[test]
    fn mime_type_carries_fixed_rate() {
        assert_eq!(input_mime_type(), "audio/pcm;rate=16000");
    }
}
