//! Persistence layer for the POS sync engine.
//!
//! # Tables (`pos` schema)
//!
//! - `users` - Accounts that may own a shop (managed elsewhere)
//! - `api_tokens` - Hashed bearer tokens used by POS clients
//! - `shops` - Tenants, one per owner
//! - `categories` - Catalog categories (managed elsewhere)
//! - `products` - Catalog products, scoped to a shop
//! - `product_variations` - Stock-carrying variations of a product
//!
//! # Backends
//!
//! Services never see a concrete database handle. They are generic over
//! [`InventoryStore`], which opens an [`InventoryTx`]:
//!
//! - [`postgres::PgInventoryStore`] - production backend on `PostgreSQL`
//! - [`memory::MemoryInventoryStore`] - serializable in-process backend for tests
//!
//! A transaction that is dropped without [`InventoryTx::commit`] is rolled
//! back, which is what happens when a client disconnects mid-batch.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p stockline-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use stockline_core::{CategoryId, ProductId, ShopId, UserId, VariationId};

use crate::models::{
    CurrentUser, Product, ProductFields, ProductVariation, Shop, StockFilter, StockRow,
    VariationFields, VariationOwnership,
};

pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., negative stock).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Named rollback points used to isolate one batch item's writes.
pub mod savepoints {
    /// Wraps one product of a bulk upload, including its variations.
    pub const PRODUCT: &str = "sync_product";
    /// Wraps one variation inside a product.
    pub const VARIATION: &str = "sync_variation";
    /// Wraps one sale event.
    pub const SALE: &str = "sync_sale";
}

/// Entry point to a persistence backend.
pub trait InventoryStore: Send + Sync + 'static {
    /// Transaction type opened by [`begin`](Self::begin).
    type Tx: InventoryTx;

    /// Open a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Resolve a non-revoked API token (by its sha-256 hex digest) to its user.
    fn user_for_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<CurrentUser>, RepositoryError>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Scoped reads and writes inside one transaction.
pub trait InventoryTx: Send {
    /// The shop owned by `owner`, if any.
    fn shop_for_owner(
        &mut self,
        owner: UserId,
    ) -> impl Future<Output = Result<Option<Shop>, RepositoryError>> + Send;

    /// Whether a category exists.
    fn category_exists(
        &mut self,
        id: CategoryId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Products of `shop` named exactly `name`, restricted to `brand` when
    /// given, lowest id first.
    fn find_products(
        &mut self,
        shop: ShopId,
        name: &str,
        brand: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Insert a product for `shop`.
    fn insert_product(
        &mut self,
        shop: ShopId,
        fields: &ProductFields,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Overwrite a product's mutable fields.
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    fn update_product(
        &mut self,
        id: ProductId,
        fields: &ProductFields,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// All variations of a product, lowest id first.
    fn variations_for_product(
        &mut self,
        product: ProductId,
    ) -> impl Future<Output = Result<Vec<ProductVariation>, RepositoryError>> + Send;

    /// Insert a variation. `None` image fields are stored empty.
    fn insert_variation(
        &mut self,
        product: ProductId,
        fields: &VariationFields,
    ) -> impl Future<Output = Result<ProductVariation, RepositoryError>> + Send;

    /// Update a variation in place.
    ///
    /// Sizes and colors are left untouched. `None` sku and image fields keep
    /// their stored values. The barcode is only written when none is stored.
    fn update_variation(
        &mut self,
        id: VariationId,
        fields: &VariationFields,
    ) -> impl Future<Output = Result<ProductVariation, RepositoryError>> + Send;

    /// A variation with the shop that owns it.
    fn find_variation(
        &mut self,
        id: VariationId,
    ) -> impl Future<Output = Result<Option<VariationOwnership>, RepositoryError>> + Send;

    /// Like [`find_variation`](Self::find_variation), holding a row lock until
    /// the transaction ends.
    fn lock_variation(
        &mut self,
        id: VariationId,
    ) -> impl Future<Output = Result<Option<VariationOwnership>, RepositoryError>> + Send;

    /// Atomically subtract `quantity` if at least that much is in stock.
    ///
    /// Returns the new quantity, or `None` (and changes nothing) when the
    /// stock is insufficient or the variation does not exist.
    fn decrement_stock(
        &mut self,
        id: VariationId,
        quantity: i32,
    ) -> impl Future<Output = Result<Option<i32>, RepositoryError>> + Send;

    /// Overwrite the stock quantity. Returns the stored quantity.
    fn set_stock(
        &mut self,
        id: VariationId,
        quantity: i32,
    ) -> impl Future<Output = Result<i32, RepositoryError>> + Send;

    /// Recompute a product's availability from its variations.
    fn refresh_product_availability(
        &mut self,
        product: ProductId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Stock rows of every variation of `shop`, ordered by product then variation.
    fn list_stock(
        &mut self,
        shop: ShopId,
        filter: &StockFilter,
    ) -> impl Future<Output = Result<Vec<StockRow>, RepositoryError>> + Send;

    /// Open a named rollback point.
    fn savepoint(
        &mut self,
        name: &'static str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Keep everything written since the named rollback point.
    fn release_savepoint(
        &mut self,
        name: &'static str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard everything written since the named rollback point.
    fn rollback_to_savepoint(
        &mut self,
        name: &'static str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Make all writes durable.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard all writes.
    fn rollback(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
