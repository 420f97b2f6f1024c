//! Reconciliation services for POS sync.
//!
//! # Services
//!
//! - `auth` - Bearer token hashing and lookup
//! - `shop_context` - Resolves the shop a request acts on
//! - `matcher` - Product and variation matching
//! - `upsert` - Bulk product upload
//! - `sales` - Sale sync with atomic stock decrement
//! - `stock` - Stock listing and manual adjustment
//!
//! Every operation runs in one transaction opened on an [`InventoryStore`]
//! and begins by resolving the shop. Item-level problems become
//! [`ItemError`]s recorded in a ledger; anything that stops the whole
//! request is a [`SyncError`].
//!
//! [`InventoryStore`]: crate::db::InventoryStore

pub mod auth;
pub mod matcher;
pub mod sales;
pub mod shop_context;
pub mod stock;
pub mod upsert;

use thiserror::Error;

use stockline_core::{CategoryId, UserId, VariationId, VariationMatchMode};

use crate::db::RepositoryError;
use crate::models::{FailureCode, ItemFailure, ItemKind};

pub use auth::{AuthError, authenticate, generate_api_token, hash_api_token};
pub use sales::sync_sales;
pub use shop_context::ShopContext;
pub use stock::{StockAdjustment, adjust_stock, list_stock};
pub use upsert::bulk_upload;

/// Tunables shared by the sync services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// How sizes and colors are compared when no barcode matches.
    pub match_mode: VariationMatchMode,
    /// Largest accepted batch (products or sales).
    pub max_batch_items: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            match_mode: VariationMatchMode::default(),
            max_batch_items: 1000,
        }
    }
}

/// A failure confined to one batch item.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    #[error("{0}")]
    Validation(String),

    #[error("variation {0} not found")]
    VariationNotFound(VariationId),

    #[error("variation {0} does not belong to this shop")]
    OwnershipViolation(VariationId),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    /// Details stay in the logs.
    #[error("failed to persist item")]
    Persistence(#[from] RepositoryError),
}

impl ItemError {
    /// Stable code reported to the client.
    #[must_use]
    pub const fn code(&self) -> FailureCode {
        match self {
            Self::CategoryNotFound(_) => FailureCode::CategoryNotFound,
            Self::Validation(_) => FailureCode::ValidationError,
            Self::VariationNotFound(_) => FailureCode::NotFound,
            Self::OwnershipViolation(_) => FailureCode::OwnershipViolation,
            Self::InsufficientStock { .. } => FailureCode::InsufficientStock,
            Self::Persistence(_) => FailureCode::PersistenceError,
        }
    }
}

/// A failure that stops the whole request.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no shop found for user {0}")]
    ShopNotFound(UserId),

    #[error("{0}")]
    Validation(String),

    #[error("variation {0} not found")]
    VariationNotFound(VariationId),

    #[error("variation {0} does not belong to this shop")]
    OwnershipViolation(VariationId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Ledger entry for a failed item. Persistence details are logged, not reported.
pub(crate) fn item_failure(
    index: usize,
    variation_index: Option<usize>,
    item_kind: ItemKind,
    err: &ItemError,
) -> ItemFailure {
    if let ItemError::Persistence(source) = err {
        tracing::warn!(index, variation_index, error = %source, "Batch item write failed");
    } else {
        tracing::debug!(index, variation_index, error = %err, "Batch item rejected");
    }

    ItemFailure {
        index,
        variation_index,
        item_kind,
        code: err.code(),
        error: err.to_string(),
    }
}

/// Reject empty and oversized batches before any transaction is opened.
pub(crate) fn validate_batch_size(
    field: &str,
    len: usize,
    max_batch_items: usize,
) -> Result<(), SyncError> {
    if len == 0 {
        return Err(SyncError::Validation(format!("{field} must not be empty")));
    }
    if len > max_batch_items {
        return Err(SyncError::Validation(format!(
            "{field} has {len} items, at most {max_batch_items} are accepted"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Seeded stores shared by the service tests.

    use rust_decimal::Decimal;

    use stockline_core::{CategoryId, ShopId, VariationId};

    use crate::db::{InventoryStore, InventoryTx, MemoryInventoryStore};
    use crate::models::{CurrentUser, ProductFields, VariationFields};

    pub struct Seeded {
        pub store: MemoryInventoryStore,
        pub owner: CurrentUser,
        pub shop: ShopId,
        pub category: CategoryId,
        pub other_owner: CurrentUser,
        pub other_shop: ShopId,
    }

    pub async fn seeded() -> Seeded {
        let store = MemoryInventoryStore::new();
        let owner_id = store.add_user("owner@example.com").await;
        let other_id = store.add_user("rival@example.com").await;
        let shop = store.add_shop(owner_id, "Main Street").await;
        let other_shop = store.add_shop(other_id, "Rival Goods").await;
        let category = store.add_category("Apparel").await;
        Seeded {
            store,
            owner: CurrentUser {
                id: owner_id,
                email: "owner@example.com".to_string(),
            },
            shop,
            category,
            other_owner: CurrentUser {
                id: other_id,
                email: "rival@example.com".to_string(),
            },
            other_shop,
        }
    }

    /// Commit a one-variation product and return the variation.
    #[allow(clippy::unwrap_used)]
    pub async fn seed_variation(
        store: &MemoryInventoryStore,
        shop: ShopId,
        category: CategoryId,
        name: &str,
        stock: i32,
    ) -> VariationId {
        let mut tx = store.begin().await.unwrap();
        let product = tx
            .insert_product(
                shop,
                &ProductFields {
                    category_id: category,
                    name: name.to_string(),
                    description: String::new(),
                    brand: None,
                    gender: None,
                },
            )
            .await
            .unwrap();
        let variation = tx
            .insert_variation(
                product.id,
                &VariationFields {
                    sizes: vec!["M".to_string()],
                    colors: Vec::new(),
                    price: Decimal::new(1999, 2),
                    original_price: None,
                    discount: Decimal::ZERO,
                    stock_quantity: stock,
                    sku: Some(format!("{name}-M")),
                    barcode: Some(format!("{name}-barcode")),
                    image_urls: None,
                    image_urls_by_color: None,
                },
            )
            .await
            .unwrap();
        tx.refresh_product_availability(product.id).await.unwrap();
        tx.commit().await.unwrap();
        variation.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_bounds() {
        assert!(matches!(
            validate_batch_size("products", 0, 10),
            Err(SyncError::Validation(_))
        ));
        assert!(validate_batch_size("products", 10, 10).is_ok());
        assert!(matches!(
            validate_batch_size("sales", 11, 10),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn test_item_error_codes() {
        assert_eq!(
            ItemError::CategoryNotFound(CategoryId::new(1)).code(),
            FailureCode::CategoryNotFound
        );
        assert_eq!(
            ItemError::InsufficientStock {
                available: 0,
                requested: 1
            }
            .code(),
            FailureCode::InsufficientStock
        );
        assert_eq!(
            ItemError::Persistence(RepositoryError::NotFound).to_string(),
            "failed to persist item"
        );
    }
}
