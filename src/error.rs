//! # Error Handling
//!
//! Custom error types and how they're converted to HTTP responses.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of failure
//! - **Data**: Each variant carries a human-readable message
//! - **Pattern matching**: `match` maps every variant to a status code
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets `?` turn I/O, config and anyhow errors into `AppError`
//! - **ResponseError trait**: Turns an `AppError` into an HTTP response
//! - **Display trait**: Defines how errors are formatted as strings
//!
//! ## What is NOT an error:
//! - A missing or malformed `Range` header (the whole file is served)
//! - Any ADPCM payload (the decoder accepts every byte sequence)

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems, including transcription failures (500)
/// - **BadRequest**: Missing upload field, wrong extension, oversize upload (400)
/// - **NotFound**: Requested recording doesn't exist (404)
/// - **ConfigError**: Configuration problems (500)
/// - **InvalidContainer**: Upload is not a mono RIFF/WAVE file (400)
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::BadRequest("No selected file".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (I/O failures, transcription failures, etc.)
    Internal(String),

    /// Client sent invalid or incomplete form data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// Upload could not be parsed as an ADPCM WAV container
    InvalidContainer(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::InvalidContainer(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Machine-readable error type used in JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigError(_) => "config_error",
            AppError::InvalidContainer(_) => "invalid_container",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ConfigError(msg)
            | AppError::InvalidContainer(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::InvalidContainer(msg) => write!(f, "Invalid container: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts errors into JSON HTTP responses.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "invalid_container",
///     "message": "Upload is not a RIFF/WAVE file",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(json!({
            "error": {
                "type": self.kind(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// When you use `?` with an anyhow::Error, it becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Filesystem failures while saving or reading recordings are server-side problems.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// The blocking pool was shut down or the blocking task panicked.
impl From<BlockingError> for AppError {
    fn from(err: BlockingError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

/// Configuration loading can fail for missing files, invalid syntax, or bad values.
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}
