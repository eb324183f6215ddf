//! Request middleware, registered with `actix_web::middleware::from_fn`.

pub mod logging;
pub mod metrics;

pub use logging::log_requests;
pub use metrics::record_metrics;
