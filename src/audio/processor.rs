//! # Upload Conversion
//!
//! Converts an uploaded ADPCM WAV into a canonical PCM WAV, and provides the
//! sample conversions the transcription pipeline needs.
//!
//! ## Pipeline:
//! ```text
//! upload bytes -> InputContainer::parse -> adpcm::decode -> write_pcm_wav
//! ```
//!
//! Everything here is synchronous and CPU-bound. HTTP handlers run it through
//! `web::block` so decoding never stalls an actix worker.

use crate::audio::adpcm;
use crate::audio::wav::{self, InputContainer};
use crate::error::AppError;

/// Result of converting one upload.
#[derive(Debug)]
pub struct Conversion {
    /// Complete PCM WAV file, ready to be written to disk
    pub wav: Vec<u8>,

    /// Number of ADPCM payload bytes consumed
    pub payload_bytes: usize,

    /// Number of PCM samples produced
    pub sample_count: usize,
}

impl Conversion {
    /// Playback duration of the converted audio in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count as f64 / wav::SAMPLE_RATE as f64
    }
}

/// Convert the bytes of an ADPCM WAV upload into a PCM WAV file.
///
/// ## Errors:
/// - **InvalidContainer**: the upload is not a mono RIFF/WAVE file
///
/// Decoding itself cannot fail; any payload decodes to `2 * len` samples.
pub fn convert_adpcm_wav(upload: &[u8]) -> Result<Conversion, AppError> {
    let container = InputContainer::parse(upload)?;
    let samples = adpcm::decode(container.payload);

    tracing::debug!(
        payload_bytes = container.payload.len(),
        samples = samples.len(),
        format_tag = container.format.format_tag,
        "Decoded ADPCM payload"
    );

    Ok(Conversion {
        wav: wav::write_pcm_wav(&samples),
        payload_bytes: container.payload.len(),
        sample_count: samples.len(),
    })
}

/// Convert 16-bit PCM samples to 32-bit floats in [-1.0, 1.0) for ML models.
pub fn pcm_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&sample| sample as f32 / 32768.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_with_payload(payload: &[u8]) -> Vec<u8> {
        // Reuse the PCM writer for the RIFF skeleton, then patch in ADPCM fields
        let mut upload = wav::write_pcm_wav(&[]);
        upload[20..22].copy_from_slice(&0x11u16.to_le_bytes());
        upload[34..36].copy_from_slice(&4u16.to_le_bytes());
        upload[40..44].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        upload.extend_from_slice(payload);
        upload
    }

    #[test]
    fn test_conversion_produces_two_samples_per_byte() {
        let upload = upload_with_payload(&[0x70, 0x07, 0x88]);
        let conversion = convert_adpcm_wav(&upload).unwrap();

        assert_eq!(conversion.payload_bytes, 3);
        assert_eq!(conversion.sample_count, 6);
        assert_eq!(conversion.wav.len(), wav::HEADER_LEN + 12);
        assert_eq!(
            wav::read_pcm_samples(&conversion.wav).unwrap(),
            adpcm::decode(&[0x70, 0x07, 0x88])
        );
    }

    #[test]
    fn test_conversion_of_empty_payload() {
        let conversion = convert_adpcm_wav(&upload_with_payload(&[])).unwrap();
        assert_eq!(conversion.sample_count, 0);
        assert_eq!(conversion.wav.len(), wav::HEADER_LEN);
    }

    #[test]
    fn test_conversion_rejects_garbage() {
        let err = convert_adpcm_wav(b"not a wav file at all").unwrap_err();
        assert!(matches!(err, AppError::InvalidContainer(_)));
    }

    #[test]
    fn test_duration() {
        let conversion = convert_adpcm_wav(&upload_with_payload(&[0u8; 8000])).unwrap();
        assert!((conversion.duration_seconds() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pcm_to_float_range() {
        let floats = pcm_to_float(&[0, 16384, -16384, i16::MIN, i16::MAX]);
        assert_eq!(floats[0], 0.0);
        assert_eq!(floats[1], 0.5);
        assert_eq!(floats[2], -0.5);
        assert_eq!(floats[3], -1.0);
        assert!(floats[4] < 1.0);
    }
}
