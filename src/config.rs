//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (APP_SERVER__HOST, APP_STORAGE__UPLOAD_DIR, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Example config.toml:
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8001
//!
//! [storage]
//! upload_dir = "uploads"
//! max_upload_bytes = 16777216
//! latest_limit = 10
//!
//! [transcription]
//! enabled = true
//! model = "base"
//! language = "en"
//! device = "auto"
//! ```

use crate::transcription::model::ModelSize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, storage, transcription)
/// keeps each section small and lets env vars target one field at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcription: TranscriptionSettings,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (the device needs this)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where recordings live and how much we accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding raw uploads and their converted `_pcm.wav` files
    pub upload_dir: String,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,

    /// How many entries `GET /latest` returns
    pub latest_limit: usize,
}

/// Speech-to-text settings.
///
/// ## Model size trade-offs:
/// - Smaller models: Faster processing, less memory, lower accuracy
/// - Larger models: Slower processing, more memory, higher accuracy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Load a Whisper model at startup and transcribe every upload
    pub enabled: bool,

    /// Whisper model size ("tiny", "base", "small", "medium", "large")
    pub model: String,

    /// Language hint passed to the model (ISO 639-1, e.g. "en")
    pub language: String,

    /// Compute device preference ("auto", "cpu", "cuda", "metal")
    pub device: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8001,
            },
            storage: StorageConfig {
                upload_dir: "uploads".to_string(),
                max_upload_bytes: 16 * 1024 * 1024,
                latest_limit: 10,
            },
            transcription: TranscriptionSettings {
                enabled: false,
                model: "base".to_string(),
                language: "en".to_string(),
                device: "auto".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_STORAGE__UPLOAD_DIR=/data/uploads`: Override upload directory
    /// - `APP_TRANSCRIPTION__ENABLED=true`: Turn on Whisper transcription
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Same as `load`, reading the optional TOML file from `file_stem`.
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Upload directory is set
    /// - Upload size limit and listing limit are greater than 0
    /// - The Whisper model size is one we know how to download
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.upload_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Upload directory cannot be empty"));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.storage.latest_limit == 0 {
            return Err(anyhow::anyhow!("Latest listing limit must be greater than 0"));
        }

        self.transcription
            .model
            .parse::<ModelSize>()
            .map_err(|e| anyhow::anyhow!("Invalid transcription model: {}", e))?;

        if self.transcription.language.trim().is_empty() {
            return Err(anyhow::anyhow!("Transcription language cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.storage.upload_dir, "uploads");
        assert_eq!(config.storage.latest_limit, 10);
        assert!(!config.transcription.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transcription.model = "gigantic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("settings");
        std::fs::write(
            stem.with_extension("toml"),
            "[storage]\nupload_dir = \"/tmp/recordings\"\nlatest_limit = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.storage.upload_dir, "/tmp/recordings");
        assert_eq!(config.storage.latest_limit, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.storage.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.transcription.model, "base");
    }
}
