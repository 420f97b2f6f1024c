//! Stockline server library.
//!
//! Lets offline POS clients push product snapshots and completed sales into
//! a shop's central catalog. Everything is exposed as a library so the
//! router can be driven in-process by tests and tools.
//!
//! # Layout
//!
//! - [`db`] - Repository traits with `PostgreSQL` and in-memory backends
//! - [`services`] - Matching, upsert, sale and stock logic
//! - [`routes`] - Axum handlers
//! - [`middleware`] - Bearer auth extractor and request IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use db::InventoryStore;
use state::AppState;

/// Build the fully layered application router.
///
/// A request that exceeds `request_timeout` is answered with 408 and its
/// handler future is dropped, which rolls back any open transaction.
pub fn app<S: InventoryStore>(state: AppState<S>, request_timeout: Duration) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
