//! Stock listing and manual stock adjustment.

use tracing::instrument;

use stockline_core::{StockChange, VariationId};

use super::{ShopContext, SyncError};
use crate::db::{InventoryStore, InventoryTx};
use crate::models::{CurrentUser, StockFilter, StockRow};

/// A requested absolute stock level for one variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub variation_id: VariationId,
    pub stock_quantity: i32,
}

/// List the stock of every variation in the caller's shop.
///
/// # Errors
///
/// Returns `SyncError::ShopNotFound` when the caller owns no shop.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_stock<S: InventoryStore>(
    store: &S,
    user: &CurrentUser,
    filter: &StockFilter,
) -> Result<Vec<StockRow>, SyncError> {
    let mut tx = store.begin().await?;
    let context = ShopContext::resolve(&mut tx, user).await?;
    let rows = tx.list_stock(context.shop.id, filter).await?;
    tx.commit().await?;
    Ok(rows)
}

/// Overwrite the stock of one of the caller's variations.
///
/// The variation row is locked for the rest of the transaction, so the
/// returned before/after pair is exact even under concurrent sales.
///
/// # Errors
///
/// Returns `SyncError::Validation` for a negative quantity (before any
/// transaction is opened), `SyncError::VariationNotFound` and
/// `SyncError::OwnershipViolation` when the variation is missing or belongs
/// to another shop.
#[instrument(skip_all, fields(user_id = %user.id, variation_id = %adjustment.variation_id))]
pub async fn adjust_stock<S: InventoryStore>(
    store: &S,
    user: &CurrentUser,
    adjustment: StockAdjustment,
) -> Result<StockChange, SyncError> {
    if adjustment.stock_quantity < 0 {
        return Err(SyncError::Validation(
            "stock quantity cannot be negative".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    let context = ShopContext::resolve(&mut tx, user).await?;

    let owned = tx
        .lock_variation(adjustment.variation_id)
        .await?
        .ok_or(SyncError::VariationNotFound(adjustment.variation_id))?;
    if owned.shop_id != context.shop.id {
        return Err(SyncError::OwnershipViolation(adjustment.variation_id));
    }

    let old_quantity = owned.variation.stock_quantity;
    let new_quantity = tx
        .set_stock(adjustment.variation_id, adjustment.stock_quantity)
        .await?;
    tx.refresh_product_availability(owned.variation.product_id)
        .await?;
    tx.commit().await?;

    tracing::info!(
        shop_id = %context.shop.id,
        old_quantity,
        new_quantity,
        "Stock adjusted"
    );

    Ok(StockChange {
        variation_id: adjustment.variation_id,
        old_quantity,
        new_quantity,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::fixtures::{seed_variation, seeded};

    #[tokio::test]
    async fn test_list_is_shop_scoped_and_filtered() {
        let seeded = seeded().await;
        let stocked = seed_variation(&seeded.store, seeded.shop, seeded.category, "a", 3).await;
        let empty = seed_variation(&seeded.store, seeded.shop, seeded.category, "b", 0).await;
        seed_variation(&seeded.store, seeded.other_shop, seeded.category, "c", 9).await;

        let all = list_stock(&seeded.store, &seeded.owner, &StockFilter::default())
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|row| row.variation_id).collect::<Vec<_>>(),
            vec![stocked, empty]
        );

        let in_stock = list_stock(
            &seeded.store,
            &seeded.owner,
            &StockFilter {
                in_stock_only: true,
                ..StockFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(in_stock.len(), 1);
        assert_eq!(in_stock[0].product_name, "a");

        let by_barcode = list_stock(
            &seeded.store,
            &seeded.owner,
            &StockFilter {
                barcode: Some("b-barcode".to_string()),
                ..StockFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_barcode.len(), 1);
        assert_eq!(by_barcode[0].variation_id, empty);

        let by_sku = list_stock(
            &seeded.store,
            &seeded.owner,
            &StockFilter {
                sku: Some("c-M".to_string()),
                ..StockFilter::default()
            },
        )
        .await
        .unwrap();
        assert!(by_sku.is_empty());
    }

    #[tokio::test]
    async fn test_adjust_reports_before_and_after() {
        let seeded = seeded().await;
        let id = seed_variation(&seeded.store, seeded.shop, seeded.category, "a", 0).await;

        let change = adjust_stock(
            &seeded.store,
            &seeded.owner,
            StockAdjustment {
                variation_id: id,
                stock_quantity: 12,
            },
        )
        .await
        .unwrap();

        assert_eq!(change.old_quantity, 0);
        assert_eq!(change.new_quantity, 12);
        assert!(seeded.store.variation(id).await.unwrap().is_available);
        assert!(seeded.store.products().await[0].is_available);
    }

    #[tokio::test]
    async fn test_adjust_rejections() {
        let seeded = seeded().await;
        let theirs =
            seed_variation(&seeded.store, seeded.other_shop, seeded.category, "t", 2).await;

        let negative = adjust_stock(
            &seeded.store,
            &seeded.owner,
            StockAdjustment {
                variation_id: theirs,
                stock_quantity: -1,
            },
        )
        .await;
        assert!(matches!(negative, Err(SyncError::Validation(_))));

        let foreign = adjust_stock(
            &seeded.store,
            &seeded.owner,
            StockAdjustment {
                variation_id: theirs,
                stock_quantity: 0,
            },
        )
        .await;
        assert!(matches!(foreign, Err(SyncError::OwnershipViolation(_))));
        assert_eq!(
            seeded.store.variation(theirs).await.unwrap().stock_quantity,
            2
        );

        let missing = adjust_stock(
            &seeded.store,
            &seeded.owner,
            StockAdjustment {
                variation_id: VariationId::new(999),
                stock_quantity: 1,
            },
        )
        .await;
        assert!(matches!(missing, Err(SyncError::VariationNotFound(_))));
    }
}
