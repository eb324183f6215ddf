//! Playback and listing of stored recordings.

use crate::error::AppError;
use crate::state::AppState;
use crate::storage::has_wav_extension;
use crate::streaming;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// `GET /uploads/{filename}` (and `/audio/{filename}`): stream a recording,
/// honouring `Range` so `<audio>` elements can seek.
pub async fn stream_recording(
    req: HttpRequest,
    filename: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let filename = filename.into_inner();

    let path = match state.store.existing_file(&filename).await {
        Ok(path) => path,
        Err(_) => {
            tracing::debug!(filename = %filename, "Recording not found");
            return Ok(HttpResponse::NotFound()
                .content_type("text/plain; charset=utf-8")
                .body("File not found"));
        }
    };

    let content_type = if has_wav_extension(&filename) {
        "audio/wav"
    } else {
        "application/octet-stream"
    };
    let range_header = req
        .headers()
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let (response, window) = streaming::range_response(&path, range_header, content_type).await?;
    state.record_streamed_bytes(window.len());

    tracing::debug!(
        filename = %filename,
        start = window.start,
        end = window.end,
        total = window.total,
        status = response.status().as_u16(),
        "Streaming recording"
    );

    Ok(response)
}

/// `GET /latest`: newest recordings first.
pub async fn latest_recordings(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let limit = state.get_config().storage.latest_limit;
    let entries = state.store.latest(limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// `GET /`: page listing the latest recordings with players.
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}
