// HTTP server module - the Prometheus scrape endpoint
//
// Each GET /metrics builds a fresh registry, runs every kind's collector
// concurrently, and encodes whatever succeeded. A kind whose read failed is
// logged and contributes zero series for that scrape; the scrape itself
// still answers 200 with the remaining kinds.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::future::join_all;
use prometheus::{Registry, TextEncoder};
use tracing::error;

use crate::collector::Collector;

/// Shared state of the scrape endpoint: the per-kind collectors.
#[derive(Clone)]
pub struct AppState {
    collectors: Arc<Vec<Box<dyn Collector>>>,
}

impl AppState {
    pub fn new(collectors: Vec<Box<dyn Collector>>) -> Self {
        AppState {
            collectors: Arc::new(collectors),
        }
    }
}

/// Builds the exporter router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    // Fresh registry per scrape: a failed kind must emit nothing, and stale
    // values from a previous scrape would violate that.
    let registry = Registry::new();

    let results = join_all(
        state
            .collectors
            .iter()
            .map(|collector| collector.collect(&registry)),
    )
    .await;
    for (collector, result) in state.collectors.iter().zip(results) {
        if let Err(err) = result {
            error!(kind = collector.name(), "failed to collect metrics: {err}");
        }
    }

    let mut buffer = String::new();
    match TextEncoder::new().encode_utf8(&registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            buffer,
        )
            .into_response(),
        Err(err) => {
            error!("failed to encode metrics: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
