use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    Error,
};
use std::time::Instant;
use tracing::{error, info};

/// Logs each request's start and outcome.
///
/// The `Range` header is recorded so partial fetches from `<audio>` players
/// can be told apart from full downloads.
pub async fn log_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let remote_addr = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    info!(%method, %uri, %remote_addr, %range, "Request started");

    let result = next.call(req).await;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    match &result {
        Ok(response) => info!(
            %method,
            %uri,
            %range,
            status = response.status().as_u16(),
            duration_ms,
            "Request completed"
        ),
        Err(err) => error!(
            %method,
            %uri,
            %remote_addr,
            duration_ms,
            error = %err,
            "Request failed"
        ),
    }

    result
}
