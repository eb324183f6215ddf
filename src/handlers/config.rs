use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Effective configuration after defaults, `config.toml` and environment overrides.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "storage": {
                "upload_dir": config.storage.upload_dir,
                "max_upload_bytes": config.storage.max_upload_bytes,
                "latest_limit": config.storage.latest_limit
            },
            "transcription": {
                "enabled": config.transcription.enabled,
                "model": config.transcription.model,
                "language": config.transcription.language,
                "device": config.transcription.device
            },
            "audio": {
                "sample_rate": crate::audio::wav::SAMPLE_RATE,
                "channels": crate::audio::wav::NUM_CHANNELS,
                "bits_per_sample": crate::audio::wav::BITS_PER_SAMPLE
            }
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_get_config() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .route("/api/v1/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["server"]["port"], 8001);
        assert_eq!(body["config"]["storage"]["latest_limit"], 10);
        assert_eq!(body["config"]["audio"]["sample_rate"], 16000);
    }
}
