//! # Whisper Transcriber
//!
//! Wraps a loaded [`WhisperModel`] behind the [`Transcriber`] capability.
//! Reads the converted PCM WAV back from disk, converts it to floats and
//! decodes it with the model.

use crate::audio::{processor::pcm_to_float, wav};
use crate::transcription::model::{ModelSize, WhisperModel};
use crate::transcription::Transcriber;
use anyhow::{anyhow, Result};
use candle_core::Device;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

/// Candle-backed Whisper transcriber.
///
/// ## Thread Safety:
/// The model keeps decoder caches and needs `&mut` access, so it sits behind
/// a `Mutex`. Concurrent uploads transcribe one at a time.
pub struct WhisperTranscriber {
    model: Mutex<WhisperModel>,
    size: ModelSize,
}

impl WhisperTranscriber {
    /// Download (or reuse cached) weights and load the model on `device`.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        let model = WhisperModel::load(size, device).await?;
        Ok(Self {
            model: Mutex::new(model),
            size,
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn name(&self) -> String {
        format!("whisper-{}", self.size)
    }

    fn transcribe(&self, wav_path: &Path, language: &str) -> Result<String> {
        let start_time = Instant::now();

        let bytes = std::fs::read(wav_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", wav_path.display(), e))?;
        let samples = wav::read_pcm_samples(&bytes).map_err(|e| anyhow!("{}", e))?;
        let audio = pcm_to_float(&samples);

        let text = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("Whisper model lock poisoned"))?;
            model.transcribe(&audio, Some(language))?
        };

        tracing::info!(
            model = %self.name(),
            audio_seconds = samples.len() as f64 / wav::SAMPLE_RATE as f64,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            chars = text.len(),
            "Transcription completed"
        );

        Ok(text)
    }
}
