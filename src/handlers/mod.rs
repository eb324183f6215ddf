pub mod config;
pub mod recordings;
pub mod upload;

pub use config::*;
pub use recordings::*;
pub use upload::*;

use crate::health;
use actix_web::web;

/// Register every route on an app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/", web::get().to(index))
    .route("/upload", web::post().to(upload_recording))
    .route("/latest", web::get().to(latest_recordings))
    .route("/uploads/{filename}", web::get().to(stream_recording))
    .route("/audio/{filename}", web::get().to(stream_recording));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::middleware::record_metrics;
    use crate::state::AppState;
    use actix_web::http::header;
    use actix_web::{middleware::from_fn, test, App};

    #[actix_web::test]
    async fn test_routes_record_metrics_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), [1u8; 200]).unwrap();

        let mut config = AppConfig::default();
        config.storage.upload_dir = dir.path().to_string_lossy().into_owned();
        let state = AppState::new(config);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(from_fn(record_metrics))
                .configure(configure),
        )
        .await;

        for range in ["bytes=0-9", "bytes=100-"] {
            let req = test::TestRequest::get()
                .uri("/uploads/a.wav")
                .insert_header((header::RANGE, range))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 206);
            test::read_body(resp).await;
        }
        let req = test::TestRequest::get().uri("/uploads/b.wav").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 3);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.bytes_streamed, 110);
        let endpoint = &metrics.endpoint_metrics["GET /uploads/{filename}"];
        assert_eq!(endpoint.request_count, 3);
        assert_eq!(endpoint.error_count, 1);
    }
}
