//! Integration tests for Stockline.
//!
//! # Running Tests
//!
//! ```bash
//! # HTTP tests against the in-memory store
//! cargo test -p stockline-integration-tests
//!
//! # Store tests against a migrated database
//! STOCKLINE_TEST_DATABASE_URL=postgres://... \
//!     cargo test -p stockline-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `pos_sync` - Full HTTP stack (auth, routing, status codes, ledgers)
//! - `postgres_store` - Sync services against `PostgreSQL`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use stockline_core::{CategoryId, ShopId};
use stockline_server::{
    db::MemoryInventoryStore, services::SyncOptions, state::AppState,
};

/// Token of the primary shop owner.
pub const OWNER_TOKEN: &str = "slk_owner";
/// Token of a second, unrelated shop owner.
pub const RIVAL_TOKEN: &str = "slk_rival";
/// Token of a user who owns no shop.
pub const SHOPLESS_TOKEN: &str = "slk_shopless";

/// A fully layered app over a seeded in-memory store.
pub struct TestContext {
    pub router: Router,
    pub store: MemoryInventoryStore,
    pub shop: ShopId,
    pub rival_shop: ShopId,
    pub category: CategoryId,
}

/// A decoded response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestContext {
    /// Seed two shop owners, one user without a shop and one category.
    pub async fn new() -> Self {
        Self::with_options(SyncOptions::default()).await
    }

    pub async fn with_options(options: SyncOptions) -> Self {
        let store = MemoryInventoryStore::new();

        let owner = store.add_user("owner@example.com").await;
        store.add_api_token(owner, OWNER_TOKEN).await;
        let shop = store.add_shop(owner, "Corner Store").await;

        let rival = store.add_user("rival@example.com").await;
        store.add_api_token(rival, RIVAL_TOKEN).await;
        let rival_shop = store.add_shop(rival, "Across The Street").await;

        let shopless = store.add_user("shopless@example.com").await;
        store.add_api_token(shopless, SHOPLESS_TOKEN).await;

        let category = store.add_category("Apparel").await;

        let state = AppState::new(store.clone(), options);
        let router = stockline_server::app(state, Duration::from_secs(30));

        Self {
            router,
            store,
            shop,
            rival_shop,
            category,
        }
    }

    /// Send a request, optionally authenticated and with a JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// Send a pre-built request.
    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post(&self, uri: &str, token: &str, body: &Value) -> TestResponse {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: &Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }
}
