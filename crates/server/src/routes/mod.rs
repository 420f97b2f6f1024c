//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                            - Liveness check
//! GET  /health/ready                      - Readiness check (store reachable)
//!
//! # POS sync (bearer token required)
//! POST /pos/products/bulk-upload          - Upsert products and variations
//! GET  /pos/products/stock                - Stock levels (?barcode=&sku=&in_stock=)
//! PUT  /pos/products/{variationId}/stock  - Set one variation's stock
//! POST /pos/sales/sync                    - Apply completed sales
//! ```

pub mod pos;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::InventoryStore;
use crate::state::AppState;

/// Build the complete router.
pub fn routes<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .merge(pos::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: InventoryStore>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
