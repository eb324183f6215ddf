//! # Byte-Range Streaming
//!
//! Serves stored recordings with HTTP partial-content semantics so browser
//! `<audio>` elements can seek without downloading the whole file.
//!
//! ## Range Policy:
//! - No `Range` header, or one that doesn't look like `bytes=<start>-<end?>`:
//!   the whole file
//! - `start` and `end` are clamped to the last byte; a request past the end
//!   collapses onto the last byte instead of failing with 416
//! - Status is 206 whenever a `Range` header was sent, 200 otherwise
//!
//! ## Memory:
//! The response body is a stream that owns the file handle and reads the
//! window in fixed-size chunks. The handle is dropped (closed) when the stream
//! finishes, fails, or the client goes away.

use actix_web::http::{header, StatusCode};
use actix_web::{web::Bytes, HttpResponse};
use futures_util::stream::{self, Stream};
use regex::Regex;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Size of each chunk read from disk while streaming.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// An inclusive byte window within a file of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeWindow {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRangeWindow {
    /// Window covering the entire file.
    pub fn full(total: u64) -> Self {
        Self {
            start: 0,
            end: total.saturating_sub(1),
            total,
        }
    }

    /// Number of bytes in the window. Zero only for an empty file.
    pub fn len(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^bytes=([0-9]+)-([0-9]*)").expect("range pattern compiles"))
}

/// Parse a decimal number, saturating at `u64::MAX` on overflow.
fn parse_offset(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Resolve a `Range` header against a file size.
///
/// ## Examples (1000-byte file):
/// ```text
/// None                  -> 0-999
/// "bytes=0-99"          -> 0-99
/// "bytes=500-"          -> 500-999
/// "bytes=2000-3000"     -> 999-999
/// "items=1-2"           -> 0-999
/// ```
pub fn resolve_range(range_header: Option<&str>, file_size: u64) -> ByteRangeWindow {
    let full = ByteRangeWindow::full(file_size);

    let Some(captures) = range_header.and_then(|value| range_pattern().captures(value.trim())) else {
        return full;
    };

    let last = file_size.saturating_sub(1);
    let start = parse_offset(&captures[1]).min(last);
    let end = match &captures[2] {
        "" => last,
        digits => parse_offset(digits).min(last),
    };

    // Still reversed after clamping; serve the whole file instead
    if end < start {
        return full;
    }

    ByteRangeWindow {
        start,
        end,
        total: file_size,
    }
}

/// Open `path` and return a stream over exactly the bytes of `window`.
pub async fn window_stream(
    path: &Path,
    window: ByteRangeWindow,
) -> io::Result<impl Stream<Item = Result<Bytes, io::Error>> + 'static> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(window.start)).await?;
    let reader = file.take(window.len());

    Ok(stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    }))
}

/// Build the full partial-content response for a stored audio file.
///
/// The caller is responsible for checking that the file exists; an I/O error
/// here means the file vanished or became unreadable in between.
pub async fn range_response(
    path: &Path,
    range_header: Option<&str>,
    content_type: &str,
) -> io::Result<(HttpResponse, ByteRangeWindow)> {
    let file_size = tokio::fs::metadata(path).await?.len();
    let window = resolve_range(range_header, file_size);

    if window.is_empty() {
        let response = HttpResponse::Ok()
            .content_type(content_type.to_string())
            .insert_header((header::ACCEPT_RANGES, "bytes"))
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .finish();
        return Ok((response, window));
    }

    let status = if range_header.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let body = window_stream(path, window).await?;
    let response = HttpResponse::build(status)
        .content_type(content_type.to_string())
        .insert_header((header::ACCEPT_RANGES, "bytes"))
        .insert_header((header::CONTENT_RANGE, window.content_range()))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .no_chunking(window.len())
        .streaming(body);

    Ok((response, window))
}
