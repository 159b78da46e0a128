use std::time::Instant;

use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::state::AppState;
use crate::store::EntityStore;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "post-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready when the entity store answers a ping.
pub async fn readiness<S: EntityStore>(state: web::Data<AppState<S>>) -> HttpResponse {
    let start = Instant::now();
    let result = state.store.ping().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "ready": true,
            "store": { "status": "healthy", "latency_ms": latency_ms },
            "timestamp": Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "ready": false,
                "store": {
                    "status": "unhealthy",
                    "message": format!("store ping failed: {}", e),
                    "latency_ms": latency_ms,
                },
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
    }
}
