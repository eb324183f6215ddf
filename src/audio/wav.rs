//! # WAV Containers
//!
//! Reading the device's ADPCM WAV uploads and writing canonical PCM WAV files.
//!
//! ## Output Format:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Header**: Canonical 44-byte RIFF/WAVE header, no extra chunks
//!
//! ## Input Format:
//! A RIFF/WAVE container whose `data` chunk holds raw 4-bit ADPCM codewords.
//! The device writes a generic header, so only the container structure and
//! the channel count are enforced.

use crate::error::AppError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Output channel count.
pub const NUM_CHANNELS: u16 = 1;

/// Output sample width in bits.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of the canonical header in bytes.
pub const HEADER_LEN: usize = 44;

/// Where the device's recordings start their payload when no `data` chunk is found.
pub const DEVICE_PAYLOAD_OFFSET: usize = 44;

const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const BLOCK_ALIGN: u16 = NUM_CHANNELS * BYTES_PER_SAMPLE;
const BYTE_RATE: u32 = SAMPLE_RATE * BLOCK_ALIGN as u32;
const PCM_FORMAT_TAG: u16 = 1;

/// Build a complete mono 16-bit 16kHz WAV file around `samples`.
///
/// ## Layout:
/// ```text
/// 0  "RIFF"  4  36 + data  8  "WAVE"
/// 12 "fmt "  16 16         20 format=1  22 channels=1
/// 24 16000   28 32000      32 align=2   34 bits=16
/// 36 "data"  40 data bytes 44 samples (i16 little-endian)
/// ```
pub fn write_pcm_wav(samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * BYTES_PER_SAMPLE as usize) as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut header[4..8], 36 + data_len);
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut header[16..20], 16);
    LittleEndian::write_u16(&mut header[20..22], PCM_FORMAT_TAG);
    LittleEndian::write_u16(&mut header[22..24], NUM_CHANNELS);
    LittleEndian::write_u32(&mut header[24..28], SAMPLE_RATE);
    LittleEndian::write_u32(&mut header[28..32], BYTE_RATE);
    LittleEndian::write_u16(&mut header[32..34], BLOCK_ALIGN);
    LittleEndian::write_u16(&mut header[34..36], BITS_PER_SAMPLE);

    header[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut header[40..44], data_len);

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);
    out.extend_from_slice(&header);
    let body_start = out.len();
    out.resize(body_start + data_len as usize, 0);
    LittleEndian::write_i16_into(samples, &mut out[body_start..]);
    out
}

/// Format information from a `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// A parsed WAV upload borrowing its payload from the original bytes.
#[derive(Debug)]
pub struct InputContainer<'a> {
    pub format: FormatChunk,
    pub payload: &'a [u8],
}

impl<'a> InputContainer<'a> {
    /// Parse and validate a RIFF/WAVE container.
    ///
    /// ## Validation:
    /// 1. Must start with `RIFF....WAVE`
    /// 2. Must contain a `fmt ` chunk of at least 16 bytes
    /// 3. Must be mono
    ///
    /// ## Payload:
    /// - The body of the `data` chunk, truncated to the file if the declared
    ///   size overruns it (the device may stream before it knows the length)
    /// - Without a `data` chunk, everything after the device's fixed 44-byte header
    pub fn parse(bytes: &'a [u8]) -> Result<Self, AppError> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AppError::InvalidContainer(
                "Upload is not a RIFF/WAVE file".to_string(),
            ));
        }

        let mut format = None;
        let mut payload = None;
        let mut offset = 12usize;

        while offset + 8 <= bytes.len() {
            let id = &bytes[offset..offset + 4];
            let declared = Cursor::new(&bytes[offset + 4..offset + 8])
                .read_u32::<LittleEndian>()
                .map_err(|e| AppError::InvalidContainer(format!("Unreadable chunk size: {}", e)))?
                as usize;
            let body_start = offset + 8;
            let body_end = body_start.saturating_add(declared).min(bytes.len());
            let body = &bytes[body_start..body_end];

            match id {
                b"fmt " => format = Some(parse_format_chunk(body)?),
                b"data" => {
                    payload = Some(body);
                    if format.is_some() {
                        break;
                    }
                }
                _ => {}
            }

            // Chunk bodies are padded to an even length
            offset = body_start.saturating_add(declared).saturating_add(declared & 1);
        }

        let format = format.ok_or_else(|| {
            AppError::InvalidContainer("Missing fmt chunk".to_string())
        })?;

        if format.channels != NUM_CHANNELS {
            return Err(AppError::InvalidContainer(format!(
                "Expected mono audio, got {} channels",
                format.channels
            )));
        }

        if format.bits_per_sample != 4 {
            tracing::warn!(
                bits_per_sample = format.bits_per_sample,
                "Upload header does not declare 4-bit samples, decoding as ADPCM anyway"
            );
        }
        if format.sample_rate != SAMPLE_RATE {
            tracing::warn!(
                sample_rate = format.sample_rate,
                "Upload header sample rate differs from {}", SAMPLE_RATE
            );
        }

        let payload = match payload {
            Some(payload) => payload,
            None => bytes.get(DEVICE_PAYLOAD_OFFSET..).ok_or_else(|| {
                AppError::InvalidContainer("Missing data chunk".to_string())
            })?,
        };

        Ok(Self { format, payload })
    }
}

fn parse_format_chunk(body: &[u8]) -> Result<FormatChunk, AppError> {
    if body.len() < 16 {
        return Err(AppError::InvalidContainer(format!(
            "fmt chunk too short: {} bytes",
            body.len()
        )));
    }

    let mut cursor = Cursor::new(body);
    let read_err = |e: std::io::Error| AppError::InvalidContainer(format!("Bad fmt chunk: {}", e));

    let format_tag = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
    let channels = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
    let sample_rate = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
    let _byte_rate = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
    let _block_align = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
    let bits_per_sample = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

    Ok(FormatChunk {
        format_tag,
        channels,
        sample_rate,
        bits_per_sample,
    })
}

/// Read the samples back out of a canonical PCM WAV produced by `write_pcm_wav`.
///
/// Used by the transcriber, which takes a path to the converted file.
pub fn read_pcm_samples(bytes: &[u8]) -> Result<Vec<i16>, AppError> {
    let container = InputContainer::parse(bytes)?;
    if container.format.format_tag != PCM_FORMAT_TAG || container.format.bits_per_sample != BITS_PER_SAMPLE {
        return Err(AppError::InvalidContainer(format!(
            "Expected 16-bit PCM, got format {} with {} bits",
            container.format.format_tag, container.format.bits_per_sample
        )));
    }

    let mut cursor = Cursor::new(container.payload);
    let mut samples = Vec::with_capacity(container.payload.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }
    Ok(samples)
}
