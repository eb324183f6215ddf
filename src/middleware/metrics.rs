use crate::state::AppState;
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error,
};
use std::time::Instant;

/// Counts requests and 4xx/5xx responses per route.
///
/// Endpoints are keyed by the matched route pattern, so every recording fetch
/// lands under `GET /uploads/{filename}` rather than one key per file.
pub async fn record_metrics(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = Instant::now();
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let pattern = req
        .match_pattern()
        .unwrap_or_else(|| req.path().to_string());
    let endpoint = format!("{} {}", req.method(), pattern);

    if let Some(state) = &state {
        state.increment_request_count();
    }

    let result = next.call(req).await;

    if let Some(state) = state {
        let is_error = match &result {
            Ok(response) => {
                response.status().is_client_error() || response.status().is_server_error()
            }
            Err(_) => true,
        };
        let duration_ms = start_time.elapsed().as_millis() as u64;

        state.record_endpoint_request(&endpoint, duration_ms, is_error);
        if is_error {
            state.increment_error_count();
        }
    }

    result
}
