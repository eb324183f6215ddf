//! # Whisper Model Management
//!
//! Loads Whisper checkpoints from the Hugging Face hub with Candle-rs and runs
//! greedy decoding over PCM audio.
//!
//! ## Model Loading Process:
//! 1. Download `config.json`, `tokenizer.json` and `model.safetensors` (cached locally)
//! 2. Load tokenizer and configuration
//! 3. Compute the mel filter bank for the model's mel bin count
//! 4. Initialize model weights on the selected device
//!
//! ## Decoding:
//! Audio is split into 30 second windows. Each window is encoded once and
//! decoded greedily from the prompt `<|startoftranscript|> <|lang|> <|transcribe|>
//! <|notimestamps|>` until end-of-text.

use crate::transcription::mel;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use hf_hub::api::tokio::ApiRepo;
use std::path::PathBuf;
use tokenizers::Tokenizer;

/// Available Whisper model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// Get the HuggingFace model repository name.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate download size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Token ids of the special tokens used to build the decoder prompt.
#[derive(Debug, Clone, Copy)]
struct SpecialTokens {
    sot: u32,
    eot: u32,
    transcribe: u32,
    no_timestamps: u32,
}

impl SpecialTokens {
    fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let id = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("Tokenizer is missing special token {}", token))
        };
        Ok(Self {
            sot: id(m::SOT_TOKEN)?,
            eot: id(m::EOT_TOKEN)?,
            transcribe: id(m::TRANSCRIBE_TOKEN)?,
            no_timestamps: id(m::NO_TIMESTAMPS_TOKEN)?,
        })
    }
}

/// A loaded Whisper model ready for transcription.
///
/// The encoder and decoder keep key/value caches, so transcription needs
/// `&mut self`. Callers share it behind a mutex.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    tokens: SpecialTokens,
    mel_filters: Vec<f32>,
}

impl WhisperModel {
    /// Download (or reuse the cached copy of) a Whisper model and load it.
    ///
    /// ## Environment Variables:
    /// - `HF_TOKEN`: Access token for the hub
    /// - `HF_HUB_CACHE` / `HF_HOME`: Cache location
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        tracing::info!("Loading Whisper {} model...", size);
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::ApiBuilder;

            let mut builder = ApiBuilder::new()
                .with_progress(false)
                .with_token(std::env::var("HF_TOKEN").ok());

            if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
                builder = builder.with_cache_dir(cache_dir.into());
            } else if let Ok(hf_home) = std::env::var("HF_HOME") {
                builder = builder.with_cache_dir(PathBuf::from(hf_home).join("hub"));
            }

            builder
                .build()
                .map_err(|e| anyhow!("Failed to create Hugging Face client: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());
        let config_filename = fetch(&repo, size, "config.json").await?;
        let tokenizer_filename = fetch(&repo, size, "tokenizer.json").await?;
        let weights_filename = fetch(&repo, size, "model.safetensors").await?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;
        tracing::debug!(num_mel_bins = config.num_mel_bins, "Model config loaded");

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let tokens = SpecialTokens::from_tokenizer(&tokenizer)?;

        let mel_filters = mel::filter_bank(config.num_mel_bins, m::N_FFT, m::SAMPLE_RATE);

        // Safety: the weights file is owned by the hub cache and not modified while mapped
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], m::DTYPE, &device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            tokens,
            mel_filters,
        })
    }

    /// Transcribe mono 16kHz audio given as floats in [-1.0, 1.0].
    ///
    /// Returns the trimmed text, which may be empty for silence.
    pub fn transcribe(&mut self, audio_data: &[f32], language: Option<&str>) -> Result<String> {
        if audio_data.is_empty() {
            return Ok(String::new());
        }

        let start_time = std::time::Instant::now();

        let language_token = match language {
            Some(lang) => {
                let token = self.tokenizer.token_to_id(&format!("<|{}|>", lang.to_lowercase()));
                if token.is_none() {
                    tracing::warn!(language = lang, "Unknown language for Whisper, letting the model decide");
                }
                token
            }
            None => None,
        };

        let mel = audio::pcm_to_mel(&self.config, audio_data, &self.mel_filters);
        let n_mels = self.config.num_mel_bins;
        let mel_len = mel.len();
        let mel = Tensor::from_vec(mel, (1, n_mels, mel_len / n_mels), &self.device)?;

        let (_, _, content_frames) = mel.dims3()?;
        let mut output_tokens = Vec::new();
        let mut seek = 0;
        while seek < content_frames {
            let segment_size = usize::min(content_frames - seek, m::N_FRAMES);
            let segment = mel.narrow(2, seek, segment_size)?;
            output_tokens.extend(self.decode_segment(&segment, language_token)?);
            seek += segment_size;
        }

        let text = self
            .tokenizer
            .decode(&output_tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        tracing::debug!(
            "Transcribed {:.2}s of audio in {:.2}s: '{}'",
            audio_data.len() as f64 / m::SAMPLE_RATE as f64,
            start_time.elapsed().as_secs_f64(),
            text.trim()
        );

        Ok(text.trim().to_string())
    }

    /// Greedy decoding of one mel window; returns the generated text tokens.
    fn decode_segment(&mut self, mel: &Tensor, language_token: Option<u32>) -> Result<Vec<u32>> {
        let audio_features = self.model.encoder.forward(mel, true)?;

        let mut tokens = vec![self.tokens.sot];
        if let Some(token) = language_token {
            tokens.push(token);
        }
        tokens.push(self.tokens.transcribe);
        tokens.push(self.tokens.no_timestamps);
        let prompt_len = tokens.len();

        let max_len = self.config.max_target_positions;
        for i in 0..max_len / 2 {
            let tokens_t = Tensor::new(tokens.as_slice(), mel.device())?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &audio_features, i == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?
                .to_dtype(DType::F32)?
                .to_vec1::<f32>()?;

            let next_token = logits
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(index, _)| index as u32)
                .ok_or_else(|| anyhow!("Decoder produced empty logits"))?;

            if next_token == self.tokens.eot || tokens.len() >= max_len {
                break;
            }
            tokens.push(next_token);
        }

        Ok(tokens.split_off(prompt_len))
    }
}

async fn fetch(repo: &ApiRepo, size: ModelSize, file: &str) -> Result<PathBuf> {
    let path = repo
        .get(file)
        .await
        .map_err(|e| anyhow!("Failed to download {} from {}: {}", file, size.repo_name(), e))?;
    tracing::debug!(file, path = %path.display(), "Model file ready");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("medium".parse::<ModelSize>().unwrap(), ModelSize::Medium);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("invalid".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_display_round_trip() {
        for size in [ModelSize::Tiny, ModelSize::Base, ModelSize::Small, ModelSize::Medium, ModelSize::Large] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
            assert!(size.repo_name().starts_with("openai/whisper-"));
        }
        assert_eq!(ModelSize::Base.size_mb(), 74);
    }
}
