use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    checkout_requests: IntCounterVec,
    manual_dispatch: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checkout_requests = IntCounterVec::new(
            Opts::new("checkout_requests_total", "Checkout attempts by outcome"),
            &["outcome"],
        )?;
        let manual_dispatch = IntCounterVec::new(
            Opts::new("manual_dispatch_total", "Admin-triggered carrier dispatches by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(checkout_requests.clone()))?;
        registry.register(Box::new(manual_dispatch.clone()))?;

        Ok(Self { registry, checkout_requests, manual_dispatch })
    }

    pub fn record_checkout(&self, outcome: &str) {
        self.checkout_requests.with_label_values(&[outcome]).inc();
    }

    pub fn record_manual_dispatch(&self, outcome: &str) {
        self.manual_dispatch.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            axum::http::StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render_with_labels() {
        let metrics = Metrics::new().unwrap();
        metrics.record_checkout("created");
        metrics.record_checkout("created");
        metrics.record_manual_dispatch("carrier_unavailable");

        let text = metrics.render().unwrap();
        assert!(text.contains("checkout_requests_total{outcome=\"created\"} 2"));
        assert!(text.contains("manual_dispatch_total{outcome=\"carrier_unavailable\"} 1"));
    }
}
