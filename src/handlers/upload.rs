//! # Upload Handler
//!
//! `POST /upload` receives an ADPCM recording from the device as the
//! multipart field `audio`, stores it, writes the decoded `_pcm.wav` next to
//! it, and optionally transcribes the result.
//!
//! ## Response:
//! ```json
//! {
//!   "message": "File uploaded and converted successfully",
//!   "originalFile": "20250115_103000_rec.wav",
//!   "pcmFile": "20250115_103000_rec_pcm.wav",
//!   "transcription": "turn on the lights"
//! }
//! ```
//! `transcription` is only present when a transcriber is loaded.

use crate::audio::convert_adpcm_wav;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::{has_wav_extension, pcm_name, timestamped_name};
use crate::transcription::or_failed_sentinel;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Serialize;

/// Multipart field carrying the recording.
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub original_file: String,
    pub pcm_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

/// The `audio` part of the form.
struct AudioUpload {
    filename: String,
    bytes: Vec<u8>,
}

pub async fn upload_recording(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let upload = read_audio_field(payload, config.storage.max_upload_bytes).await?;

    if upload.filename.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }
    if !has_wav_extension(&upload.filename) {
        return Err(AppError::BadRequest(
            "Invalid file format. Please upload a WAV file.".to_string(),
        ));
    }

    let original_file = timestamped_name(&upload.filename, chrono::Local::now())
        .ok_or_else(|| AppError::BadRequest("No selected file".to_string()))?;
    state.store.save(&original_file, &upload.bytes).await?;

    tracing::info!(
        file = %original_file,
        bytes = upload.bytes.len(),
        "Recording uploaded"
    );

    // The raw upload stays on disk even if it turns out not to be a valid container
    let conversion = web::block(move || convert_adpcm_wav(&upload.bytes)).await??;

    let pcm_file = pcm_name(&original_file);
    let pcm_path = state.store.save(&pcm_file, &conversion.wav).await?;
    state.record_conversion(conversion.sample_count);

    tracing::info!(
        file = %pcm_file,
        samples = conversion.sample_count,
        duration_s = conversion.duration_seconds(),
        "Recording converted to PCM"
    );

    let transcription = match state.transcriber.clone() {
        Some(transcriber) => {
            let language = config.transcription.language.clone();
            let text = web::block(move || transcriber.transcribe(&pcm_path, &language))
                .await?
                .map_err(|e| AppError::Internal(format!("Transcription failed: {}", e)))?;
            let text = or_failed_sentinel(text);
            tracing::info!(file = %pcm_file, transcription = %text, "Recording transcribed");
            Some(text)
        }
        None => None,
    };

    let message = if transcription.is_some() {
        "File uploaded, converted, and transcribed successfully"
    } else {
        "File uploaded and converted successfully"
    };

    Ok(HttpResponse::Ok().json(UploadResponse {
        message: message.to_string(),
        original_file,
        pcm_file,
        transcription,
    }))
}

/// Find the `audio` field and read it fully, enforcing `max_bytes`.
async fn read_audio_field(mut payload: Multipart, max_bytes: usize) -> Result<AudioUpload, AppError> {
    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let Some(content_disposition) = field.content_disposition() else {
            continue;
        };
        if content_disposition.get_name() != Some(AUDIO_FIELD) {
            continue;
        }
        let filename = content_disposition
            .get_filename()
            .unwrap_or_default()
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(AudioUpload { filename, bytes });
    }

    Err(AppError::BadRequest("No file part".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav;
    use crate::config::AppConfig;
    use crate::transcription::{Transcriber, FAILED_TRANSCRIPTION};
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use std::path::Path;
    use std::sync::Arc;

    const BOUNDARY: &str = "recording-boundary";

    struct FixedTranscriber(&'static str);

    impl Transcriber for FixedTranscriber {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn transcribe(&self, wav_path: &Path, _language: &str) -> anyhow::Result<String> {
            assert!(wav_path.to_string_lossy().ends_with("_pcm.wav"));
            Ok(self.0.to_string())
        }
    }

    struct BrokenTranscriber;

    impl Transcriber for BrokenTranscriber {
        fn name(&self) -> String {
            "broken".to_string()
        }

        fn transcribe(&self, _wav_path: &Path, _language: &str) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("model exploded"))
        }
    }

    fn adpcm_upload(payload: &[u8]) -> Vec<u8> {
        let mut upload = wav::write_pcm_wav(&[]);
        upload[20..22].copy_from_slice(&0x11u16.to_le_bytes());
        upload[34..36].copy_from_slice(&4u16.to_le_bytes());
        upload[40..44].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        upload.extend_from_slice(payload);
        upload
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: audio/wav\r\n\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    fn state_in(dir: &Path) -> AppState {
        let mut config = AppConfig::default();
        config.storage.upload_dir = dir.to_string_lossy().into_owned();
        AppState::new(config)
    }

    macro_rules! upload_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .route("/upload", web::post().to(upload_recording)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_upload_converts_recording() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let app = upload_app!(state.clone());

        let body = multipart_body("audio", "rec.wav", &adpcm_upload(&[0x70, 0x07, 0x88, 0x00]));
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "File uploaded and converted successfully");
        assert!(json.get("transcription").is_none());

        let original = json["originalFile"].as_str().unwrap();
        let pcm = json["pcmFile"].as_str().unwrap();
        assert!(original.ends_with("_rec.wav"));
        assert_eq!(pcm, original.replace(".wav", "_pcm.wav"));

        let pcm_bytes = std::fs::read(dir.path().join(pcm)).unwrap();
        assert_eq!(pcm_bytes.len(), wav::HEADER_LEN + 16);
        assert!(dir.path().join(original).is_file());
        assert_eq!(state.get_metrics_snapshot().samples_decoded, 8);
    }

    #[actix_web::test]
    async fn test_upload_keeps_inner_dots_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let app = upload_app!(state_in(dir.path()));

        for filename in ["take..2.wav", "rec..wav"] {
            let body = multipart_body("audio", filename, &adpcm_upload(&[0x12, 0x34]));
            let resp = test::call_service(&app, upload_request(body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "{filename}");

            let json: serde_json::Value = test::read_body_json(resp).await;
            let original = json["originalFile"].as_str().unwrap();
            let pcm = json["pcmFile"].as_str().unwrap();
            assert!(original.ends_with(&format!("_{}", filename)), "{original}");
            assert!(dir.path().join(original).is_file());
            assert!(dir.path().join(pcm).is_file());
        }
    }

    #[actix_web::test]
    async fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let app = upload_app!(state_in(dir.path()));

        let cases = [
            (multipart_body("file", "rec.wav", b"RIFF"), "No file part"),
            (multipart_body("audio", "", b"RIFF"), "No selected file"),
            (
                multipart_body("audio", "notes.txt", b"hello"),
                "Invalid file format. Please upload a WAV file.",
            ),
        ];

        for (body, message) in cases {
            let resp = test::call_service(&app, upload_request(body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let json: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(json["error"]["message"], message);
        }
    }

    #[actix_web::test]
    async fn test_upload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        state.config.write().unwrap().storage.max_upload_bytes = 64;
        let app = upload_app!(state.clone());

        let body = multipart_body("audio", "rec.wav", &adpcm_upload(&[0u8; 100]));
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(state.get_metrics_snapshot().uploads_converted, 0);
    }

    #[actix_web::test]
    async fn test_invalid_container_keeps_raw_upload() {
        let dir = tempfile::tempdir().unwrap();
        let app = upload_app!(state_in(dir.path()));

        let body = multipart_body("audio", "junk.wav", b"definitely not riff data");
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["error"]["type"], "invalid_container");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("_junk.wav"));
    }

    #[actix_web::test]
    async fn test_upload_with_transcriber() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).with_transcriber(Arc::new(FixedTranscriber("hello there")));
        let app = upload_app!(state);

        let body = multipart_body("audio", "rec.wav", &adpcm_upload(&[0x11; 16]));
        let json: serde_json::Value =
            test::call_and_read_body_json(&app, upload_request(body).to_request()).await;
        assert_eq!(json["message"], "File uploaded, converted, and transcribed successfully");
        assert_eq!(json["transcription"], "hello there");
    }

    #[actix_web::test]
    async fn test_empty_transcription_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).with_transcriber(Arc::new(FixedTranscriber("")));
        let app = upload_app!(state);

        let body = multipart_body("audio", "rec.wav", &adpcm_upload(&[0x00; 16]));
        let json: serde_json::Value =
            test::call_and_read_body_json(&app, upload_request(body).to_request()).await;
        assert_eq!(json["transcription"], FAILED_TRANSCRIPTION);
    }

    #[actix_web::test]
    async fn test_transcription_failure_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).with_transcriber(Arc::new(BrokenTranscriber));
        let app = upload_app!(state);

        let body = multipart_body("audio", "rec.wav", &adpcm_upload(&[0x00; 16]));
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert!(json["error"]["message"].as_str().unwrap().contains("model exploded"));
    }
}
