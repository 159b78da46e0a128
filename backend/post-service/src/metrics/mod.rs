//! Prometheus metrics for post-service.
//!
//! Feed and delete collectors, the process collector, and the handler
//! behind `/metrics`.

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};
use tracing::warn;

pub mod cascade;
pub mod feed;

/// Register CPU, memory and file descriptor gauges for this process.
/// Only Linux exposes them; elsewhere this does nothing.
#[cfg(target_os = "linux")]
pub fn register_process_metrics() {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(err) = prometheus::register(Box::new(collector)) {
        warn!(error = %err, "Failed to register process metrics");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn register_process_metrics() {}

/// Text exposition of every registered collector.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(body) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(body),
        Err(err) => {
            warn!(error = %err, "Failed to encode metrics");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn process_metrics_are_exported() {
        register_process_metrics();
        // a second registration is rejected and only logged
        register_process_metrics();

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.iter().any(|name| name == "process_start_time_seconds"));
    }
}
