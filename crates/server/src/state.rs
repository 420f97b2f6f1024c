//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::InventoryStore;
use crate::services::SyncOptions;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Generic over the persistence backend so the
/// same router serves `PostgreSQL` in production and the in-memory store in
/// tests.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: S,
    sync: SyncOptions,
}

// Manual impl: cloning the state must not require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: InventoryStore> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: S, sync: SyncOptions) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store, sync }),
        }
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Options for the sync services.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        self.inner.sync
    }
}
