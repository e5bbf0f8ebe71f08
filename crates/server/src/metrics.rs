//! Prometheus metrics for the image I/O daemon.
//!
//! Metrics never carry ticket ids or backend paths; they are exposed on the
//! control socket only.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Request metrics
pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "imageio_requests_total",
            "Total number of images requests by method and status class",
        ),
        &["method", "status"],
    )
    .expect("metric creation failed")
});

pub static AUTH_DENIALS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "imageio_auth_denials_total",
            "Total number of requests refused by ticket authorization",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

// Data metrics
pub static BYTES_READ: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("imageio_bytes_read_total", "Total bytes served by GET")
        .expect("metric creation failed")
});

pub static BYTES_WRITTEN: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("imageio_bytes_written_total", "Total bytes written by PUT")
        .expect("metric creation failed")
});

pub static BYTES_ZEROED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "imageio_bytes_zeroed_total",
        "Total bytes zeroed by PATCH zero",
    )
    .expect("metric creation failed")
});

pub static FLUSHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("imageio_flushes_total", "Total number of backend flushes")
        .expect("metric creation failed")
});

// Ticket metrics
pub static TICKETS_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "imageio_tickets_active",
        "Number of tickets registered in the ticket store",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTH_DENIALS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_READ.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_WRITTEN.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_ZEROED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FLUSHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TICKETS_ACTIVE.clone()))
            .expect("metric registration failed");
    });
}

/// Record a finished images request.
pub fn record_request(method: &str, status: StatusCode) {
    let class = match status.as_u16() {
        200..=299 => "2xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };
    REQUESTS.with_label_values(&[method, class]).inc();
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
