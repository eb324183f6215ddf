//! # Recording Storage
//!
//! Owns the upload directory: naming uploads, saving them, resolving request
//! paths to files, and listing the most recent recordings.
//!
//! ## Naming Scheme:
//! ```text
//! upload "rec 01.wav" at 2025-01-15 10:30:00
//!   original: 20250115_103000_rec_01.wav
//!   derived:  20250115_103000_rec_01_pcm.wav
//! ```
//!
//! Uploads are written completely before the handler returns, so a file that
//! shows up in a listing is never still being written.

use crate::error::AppError;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extension accepted for uploads and listed by `latest`.
const WAV_EXTENSION: &str = "wav";

/// Suffix used for the converted PCM file.
const PCM_SUFFIX: &str = "_pcm.wav";

/// One entry of the "latest recordings" listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordingEntry {
    pub name: String,
    pub size: u64,
    pub created: String,
}

/// Handle to the upload directory.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    root: PathBuf,
}

impl RecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if it doesn't exist yet.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Map a client-supplied file name to a path inside the upload directory.
    ///
    /// Names containing path separators or NUL, and the bare `.` and `..`
    /// entries, are refused so a request can never reach outside the directory.
    /// Dots inside a single component (`take..2.wav`) are ordinary characters.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AppError> {
        let unsafe_name = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(AppError::NotFound(format!("File not found: {}", name)));
        }
        Ok(self.root.join(name))
    }

    /// Resolve `name` and check that it refers to an existing regular file.
    pub async fn existing_file(&self, name: &str) -> Result<PathBuf, AppError> {
        let path = self.resolve(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(AppError::NotFound(format!("File not found: {}", name))),
        }
    }

    /// Write `bytes` to `name` inside the upload directory.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved file");
        Ok(path)
    }

    /// List up to `limit` `.wav` files, newest first.
    ///
    /// A missing upload directory is created and reported as empty.
    pub async fn latest(&self, limit: usize) -> Result<Vec<RecordingEntry>, AppError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.ensure_dir().await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(SystemTime, RecordingEntry)> = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !has_wav_extension(&name) {
                continue;
            }

            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            found.push((
                created,
                RecordingEntry {
                    name,
                    size: meta.len(),
                    created: DateTime::<Utc>::from(created).to_rfc3339(),
                },
            ));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        Ok(found.into_iter().take(limit).map(|(_, entry)| entry).collect())
    }
}

/// Whether `name` ends in `.wav`, ignoring case.
pub fn has_wav_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(WAV_EXTENSION))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe ASCII name.
///
/// Whitespace becomes `_`, anything other than ASCII letters, digits, `.`, `-`
/// and `_` is dropped, and leading dots/underscores are stripped.
/// Returns `None` if nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    // Browsers on Windows may send the full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Prefix an upload name with its arrival time and sanitize the result.
pub fn timestamped_name(original: &str, now: DateTime<Local>) -> Option<String> {
    sanitize_filename(&format!("{}_{}", now.format("%Y%m%d_%H%M%S"), original))
}

/// Name of the converted PCM file for an upload name.
pub fn pcm_name(name: &str) -> String {
    let stem_len = if has_wav_extension(name) {
        name.len() - WAV_EXTENSION.len() - 1
    } else {
        name.len()
    };
    format!("{}{}", &name[..stem_len], PCM_SUFFIX)
}
