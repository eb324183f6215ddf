//! # Transcription Module
//!
//! Optional speech-to-text over converted recordings, using Whisper models via
//! the Candle-rs framework (no FFI bindings to whisper.cpp).
//!
//! ## Key Components:
//! - **Transcriber**: the capability the upload handler depends on
//! - **WhisperTranscriber**: Candle-backed implementation, loaded once at startup
//! - **Mel filters**: the filter bank Whisper's log-mel front end expects
//!
//! ## Whisper Model Sizes:
//! - **tiny**: ~39MB, fastest but least accurate
//! - **base**: ~74MB, good balance for short voice clips
//! - **small**: ~244MB, better accuracy
//! - **medium**: ~769MB
//! - **large**: ~1550MB, best accuracy but slowest

pub mod engine;
pub mod mel;
pub mod model;

use std::path::Path;

pub use engine::WhisperTranscriber;

/// Text reported when the model recognized nothing.
pub const FAILED_TRANSCRIPTION: &str = "failed to transcribe";

/// Speech-to-text over a PCM WAV file on disk.
///
/// Implementations are blocking; callers run them on the blocking pool.
pub trait Transcriber: Send + Sync {
    /// Human-readable identifier, e.g. `whisper-base`.
    fn name(&self) -> String;

    /// Recognize speech in the 16 kHz mono PCM WAV at `wav_path`.
    ///
    /// May return an empty string for silence.
    fn transcribe(&self, wav_path: &Path, language: &str) -> anyhow::Result<String>;
}

/// Replace empty recognition output with [`FAILED_TRANSCRIPTION`].
pub fn or_failed_sentinel(text: String) -> String {
    if text.trim().is_empty() {
        FAILED_TRANSCRIPTION.to_string()
    } else {
        text
    }
}
