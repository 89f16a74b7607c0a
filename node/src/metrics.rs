//! # Prometheus Metrics
//!
//! Verification counters and latency for the service. Scraped by Prometheus
//! at `/metrics` on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the service.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Proofs whose signature checked out.
    pub proofs_verified_total: IntCounter,
    /// Well-formed proofs that did not verify.
    pub proofs_rejected_total: IntCounter,
    /// Requests refused as malformed or unsupported.
    pub bad_requests_total: IntCounter,
    /// Requests that failed because a provider or network did not answer.
    pub upstream_errors_total: IntCounter,
    pub validation_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("account_link".into()), None)?;

        let proofs_verified_total = register(
            &registry,
            IntCounter::new("proofs_verified_total", "Proofs that verified")?,
        )?;
        let proofs_rejected_total = register(
            &registry,
            IntCounter::new(
                "proofs_rejected_total",
                "Well-formed proofs whose signature did not verify",
            )?,
        )?;
        let bad_requests_total = register(
            &registry,
            IntCounter::new(
                "bad_requests_total",
                "Requests refused as malformed or unsupported",
            )?,
        )?;
        let upstream_errors_total = register(
            &registry,
            IntCounter::new(
                "upstream_errors_total",
                "Requests failed by a signing provider or verification network",
            )?,
        )?;
        let validation_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "validation_latency_seconds",
                    "Proof validation latency in seconds",
                )
                .buckets(vec![
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            proofs_verified_total,
            proofs_rejected_total,
            bad_requests_total,
            upstream_errors_total,
            validation_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_prefixed_metric_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.proofs_verified_total.inc();
        metrics.validation_latency_seconds.observe(0.002);

        let text = metrics.encode().unwrap();
        assert!(text.contains("account_link_proofs_verified_total 1"));
        assert!(text.contains("account_link_proofs_rejected_total 0"));
        assert!(text.contains("account_link_validation_latency_seconds_count 1"));
    }
}
