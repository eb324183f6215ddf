//! # Audio Processing Module
//!
//! Turns the recording device's ADPCM uploads into playable PCM WAV files.
//!
//! ## Key Components:
//! - **ADPCM Decoder**: 4-bit codewords to 16-bit samples (`adpcm`)
//! - **WAV Containers**: Upload validation and canonical PCM output (`wav`)
//! - **Converter**: The full upload-to-playback pipeline (`processor`)
//!
//! ## Output Format Requirements:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers

pub mod adpcm;       // ADPCM codeword decoding
pub mod processor;   // Upload to PCM conversion pipeline
pub mod wav;         // RIFF/WAVE reading and writing

pub use processor::{convert_adpcm_wav, Conversion};
