//! Sale sync: decrements stock for completed POS sales.
//!
//! Each sale runs in its own savepoint. The decrement is a single
//! conditional update, so concurrent syncs can never drive stock below zero;
//! a sale that would oversell is rejected on its own. The batch commits when
//! at least one sale applied.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use stockline_core::StockChange;

use super::{ItemError, ShopContext, SyncError, SyncOptions, item_failure, validate_batch_size};
use crate::db::{InventoryStore, InventoryTx, savepoints};
use crate::models::{CurrentUser, ItemKind, SaleEvent, SaleSyncLedger, SaleSyncRequest};

/// Apply a batch of sales to the caller's stock.
///
/// # Errors
///
/// Returns `SyncError::Validation` for an empty or oversized batch,
/// `SyncError::ShopNotFound` when the caller owns no shop, and
/// `SyncError::Repository` when the transaction itself fails.
#[instrument(skip_all, fields(user_id = %user.id, sales = request.sales.len()))]
pub async fn sync_sales<S: InventoryStore>(
    store: &S,
    options: SyncOptions,
    user: &CurrentUser,
    request: SaleSyncRequest,
) -> Result<SaleSyncLedger, SyncError> {
    validate_batch_size("sales", request.sales.len(), options.max_batch_items)?;

    let mut tx = store.begin().await?;
    let context = ShopContext::resolve(&mut tx, user).await?;
    let mut ledger = SaleSyncLedger::new(request.sales.len());

    for (position, sale) in request.sales.iter().enumerate() {
        let index = position + 1;

        tx.savepoint(savepoints::SALE).await?;
        match apply_sale(&mut tx, &context, sale).await {
            Ok(change) => {
                tx.release_savepoint(savepoints::SALE).await?;
                ledger.record_processed(change);
            }
            Err(err) => {
                tx.rollback_to_savepoint(savepoints::SALE).await?;
                tx.release_savepoint(savepoints::SALE).await?;
                ledger.record_failure(item_failure(index, None, ItemKind::Sale, &err));
            }
        }
    }

    if ledger.processed == 0 {
        tx.rollback().await?;
        ledger.mark_rolled_back();
        tracing::warn!(
            shop_id = %context.shop.id,
            failed = ledger.failed,
            "Sale sync applied nothing, rolled back"
        );
        return Ok(ledger);
    }

    tx.commit().await?;
    ledger.success = true;
    tracing::info!(
        shop_id = %context.shop.id,
        processed = ledger.processed,
        failed = ledger.failed,
        "Sale sync committed"
    );
    Ok(ledger)
}

async fn apply_sale<T: InventoryTx>(
    tx: &mut T,
    context: &ShopContext,
    sale: &SaleEvent,
) -> Result<StockChange, ItemError> {
    if sale.quantity <= 0 {
        return Err(ItemError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    if sale.price < Decimal::ZERO {
        return Err(ItemError::Validation("price cannot be negative".to_string()));
    }

    let owned = tx
        .find_variation(sale.variation_id)
        .await?
        .ok_or(ItemError::VariationNotFound(sale.variation_id))?;
    if owned.shop_id != context.shop.id {
        return Err(ItemError::OwnershipViolation(sale.variation_id));
    }

    let available = owned.variation.stock_quantity;
    let insufficient = ItemError::InsufficientStock {
        available,
        requested: sale.quantity,
    };
    if available < sale.quantity {
        return Err(insufficient);
    }

    // Stock may have moved since the read; the decrement re-checks atomically.
    let Some(new_quantity) = tx.decrement_stock(sale.variation_id, sale.quantity).await? else {
        return Err(insufficient);
    };
    tx.refresh_product_availability(owned.variation.product_id)
        .await?;

    tracing::debug!(
        variation_id = %sale.variation_id,
        quantity = sale.quantity,
        price = %sale.price,
        size = sale.size.as_deref(),
        color = sale.color.as_deref(),
        sold_at = %sale.sale_date.unwrap_or_else(Utc::now),
        new_quantity,
        "Sale applied"
    );

    Ok(StockChange {
        variation_id: sale.variation_id,
        old_quantity: new_quantity + sale.quantity,
        new_quantity,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockline_core::VariationId;

    use super::*;
    use crate::models::FailureCode;
    use crate::services::fixtures::{Seeded, seed_variation, seeded};

    fn sale(variation_id: VariationId, quantity: i32) -> SaleEvent {
        SaleEvent {
            variation_id,
            quantity,
            size: Some("M".to_string()),
            color: None,
            price: Decimal::new(1999, 2),
            sale_date: None,
        }
    }

    async fn sync(seeded: &Seeded, sales: Vec<SaleEvent>) -> SaleSyncLedger {
        sync_sales(
            &seeded.store,
            SyncOptions::default(),
            &seeded.owner,
            SaleSyncRequest { sales },
        )
        .await
        .unwrap()
    }

    async fn stock_of(seeded: &Seeded, id: VariationId) -> i32 {
        seeded.store.variation(id).await.unwrap().stock_quantity
    }

    #[tokio::test]
    async fn test_oversell_fails_alone_and_batch_commits() {
        let seeded = seeded().await;
        let a = seed_variation(&seeded.store, seeded.shop, seeded.category, "a", 5).await;
        let b = seed_variation(&seeded.store, seeded.shop, seeded.category, "b", 1).await;

        let ledger = sync(&seeded, vec![sale(a, 2), sale(b, 3), sale(a, 1)]).await;

        assert!(ledger.success);
        assert_eq!(ledger.processed, 2);
        assert_eq!(ledger.failed, 1);
        assert_eq!(ledger.processed + ledger.failed, ledger.total_sales);
        assert_eq!(ledger.failures[0].index, 2);
        assert_eq!(ledger.failures[0].code, FailureCode::InsufficientStock);
        assert_eq!(
            ledger.errors[0],
            "Sale 2: insufficient stock: available 1, requested 3"
        );

        assert_eq!(ledger.updated_stock[0].old_quantity, 5);
        assert_eq!(ledger.updated_stock[0].new_quantity, 3);
        assert_eq!(ledger.updated_stock[1].old_quantity, 3);
        assert_eq!(ledger.updated_stock[1].new_quantity, 2);

        assert_eq!(stock_of(&seeded, a).await, 2);
        assert_eq!(stock_of(&seeded, b).await, 1);
    }

    #[tokio::test]
    async fn test_stock_runs_down_to_zero_and_then_rejects() {
        let seeded = seeded().await;
        let id = seed_variation(&seeded.store, seeded.shop, seeded.category, "tee", 10).await;

        let ledger = sync(&seeded, vec![sale(id, 7)]).await;
        assert_eq!(ledger.updated_stock[0].new_quantity, 3);
        assert!(ledger.updated_stock[0].is_available());
        assert!(seeded.store.variation(id).await.unwrap().is_available);

        let ledger = sync(&seeded, vec![sale(id, 3)]).await;
        assert_eq!(ledger.updated_stock[0].new_quantity, 0);
        assert!(!seeded.store.variation(id).await.unwrap().is_available);
        assert!(!seeded.store.products().await[0].is_available);

        let ledger = sync(&seeded, vec![sale(id, 1)]).await;
        assert!(!ledger.success);
        assert_eq!(ledger.failed, 1);
        assert!(ledger.updated_stock.is_empty());
        assert_eq!(stock_of(&seeded, id).await, 0);
    }

    #[tokio::test]
    async fn test_foreign_and_missing_variations_are_rejected() {
        let seeded = seeded().await;
        let mine = seed_variation(&seeded.store, seeded.shop, seeded.category, "mine", 4).await;
        let theirs =
            seed_variation(&seeded.store, seeded.other_shop, seeded.category, "theirs", 4).await;

        let ledger = sync(
            &seeded,
            vec![sale(theirs, 1), sale(VariationId::new(404), 1), sale(mine, 1)],
        )
        .await;

        assert_eq!(ledger.processed, 1);
        assert_eq!(ledger.failures[0].code, FailureCode::OwnershipViolation);
        assert_eq!(ledger.failures[1].code, FailureCode::NotFound);
        assert_eq!(stock_of(&seeded, theirs).await, 4);
        assert_eq!(stock_of(&seeded, mine).await, 3);
    }

    #[tokio::test]
    async fn test_invalid_events_are_item_failures() {
        let seeded = seeded().await;
        let id = seed_variation(&seeded.store, seeded.shop, seeded.category, "x", 4).await;
        let mut negative_price = sale(id, 1);
        negative_price.price = Decimal::new(-5, 0);

        let ledger = sync(&seeded, vec![sale(id, 0), negative_price]).await;

        assert!(!ledger.success);
        assert_eq!(ledger.failed, 2);
        assert!(
            ledger
                .failures
                .iter()
                .all(|f| f.code == FailureCode::ValidationError)
        );
        assert_eq!(stock_of(&seeded, id).await, 4);
    }

    #[tokio::test]
    async fn test_total_failure_leaves_store_unchanged() {
        let seeded = seeded().await;
        let id = seed_variation(&seeded.store, seeded.shop, seeded.category, "y", 1).await;
        let before = seeded.store.variations().await;

        let ledger = sync(&seeded, vec![sale(id, 2), sale(id, 5)]).await;

        assert!(!ledger.success);
        assert_eq!(ledger.processed, 0);
        assert_eq!(seeded.store.variations().await, before);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let seeded = seeded().await;
        let result = sync_sales(
            &seeded.store,
            SyncOptions::default(),
            &seeded.owner,
            SaleSyncRequest { sales: Vec::new() },
        )
        .await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_syncs_never_oversell() {
        let seeded = seeded().await;
        let id = seed_variation(&seeded.store, seeded.shop, seeded.category, "hot", 5).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = seeded.store.clone();
            let owner = seeded.owner.clone();
            handles.push(tokio::spawn(async move {
                sync_sales(
                    &store,
                    SyncOptions::default(),
                    &owner,
                    SaleSyncRequest {
                        sales: vec![sale(id, 1)],
                    },
                )
                .await
                .unwrap()
            }));
        }

        let mut processed = 0;
        for handle in handles {
            processed += handle.await.unwrap().processed;
        }

        assert_eq!(processed, 5);
        assert_eq!(stock_of(&seeded, id).await, 0);
    }
}
