//! # Application State Management
//!
//! Shared state handed to every request handler through `web::Data<AppState>`.
//!
//! ## Sharing Pattern:
//! - **Arc<RwLock<T>>** for data that changes while the server runs (config, metrics)
//! - **Plain fields** for data fixed at startup (start time, recording store)
//! - **Arc<dyn Transcriber>** for the optional speech-to-text capability, loaded once
//!   in `main` and never swapped out
//!
//! Lock poisoning is recovered from rather than propagated: every critical
//! section here is a handful of counter updates that cannot leave the data
//! half-written.

use crate::config::AppConfig;
use crate::storage::RecordingStore;
use crate::transcription::Transcriber;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<RwLock<AppConfig>>,

    /// Counters updated by the middleware and the upload/stream handlers
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    /// The upload directory
    pub store: RecordingStore,

    /// Speech-to-text, present only when `transcription.enabled` is set
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("start_time", &self.start_time)
            .field("store", &self.store)
            .field("transcriber", &self.transcriber.as_ref().map(|t| t.name()))
            .finish()
    }
}

/// Metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Uploads successfully converted to PCM
    pub uploads_converted: u64,

    /// PCM samples produced by the ADPCM decoder
    pub samples_decoded: u64,

    /// Body bytes sent by the range streamer
    pub bytes_streamed: u64,

    /// Key: "METHOD /route/pattern", e.g. "GET /uploads/{filename}"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Metrics for a single route.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = RecordingStore::new(&config.storage.upload_dir);
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            store,
            transcriber: None,
        }
    }

    /// Attach a loaded transcriber.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately.
    pub fn get_config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_metrics<R>(&self, update: impl FnOnce(&mut AppMetrics) -> R) -> R {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics)
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|m| m.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|m| m.error_count += 1);
    }

    /// Record timing and outcome for one request to `endpoint`.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|m| {
            let endpoint_metric = m.endpoint_metrics.entry(endpoint.to_string()).or_default();
            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;
            if is_error {
                endpoint_metric.error_count += 1;
            }
        });
    }

    /// Count one converted upload and the samples it produced.
    pub fn record_conversion(&self, sample_count: usize) {
        self.with_metrics(|m| {
            m.uploads_converted += 1;
            m.samples_decoded += sample_count as u64;
        });
    }

    pub fn record_streamed_bytes(&self, bytes: u64) {
        self.with_metrics(|m| m.bytes_streamed += bytes);
    }

    /// Consistent copy of the metrics for serialization.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
