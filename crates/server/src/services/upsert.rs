//! Bulk product upload.
//!
//! One transaction per batch. Each product runs inside its own savepoint and
//! each of its variations inside a nested one, so a failing item only
//! discards its own writes. The batch commits when at least one product was
//! created or updated; otherwise everything is rolled back and the ledger
//! reports total failure.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::instrument;

use stockline_core::{Gender, ProductId, VariationId, VariationMatchMode};

use super::matcher::{match_product, match_variation};
use super::{ItemError, ShopContext, SyncError, SyncOptions, item_failure, validate_batch_size};
use crate::db::{InventoryStore, InventoryTx, savepoints};
use crate::models::{
    BulkUploadLedger, BulkUploadRequest, CurrentUser, DuplicateItem, ItemFailure, ItemKind,
    ProductFields, ProductPayload, ProductVariation, VariationFields, VariationPayload,
};

const MAX_DISCOUNT: Decimal = Decimal::ONE_HUNDRED;

/// Reconcile a batch of products against the caller's catalog.
///
/// # Errors
///
/// Returns `SyncError::Validation` for an empty or oversized batch,
/// `SyncError::ShopNotFound` when the caller owns no shop, and
/// `SyncError::Repository` when the transaction itself fails. Item problems
/// are reported in the ledger instead.
#[instrument(skip_all, fields(user_id = %user.id, products = request.products.len()))]
pub async fn bulk_upload<S: InventoryStore>(
    store: &S,
    options: SyncOptions,
    user: &CurrentUser,
    request: BulkUploadRequest,
) -> Result<BulkUploadLedger, SyncError> {
    validate_batch_size("products", request.products.len(), options.max_batch_items)?;

    let mut tx = store.begin().await?;
    let context = ShopContext::resolve(&mut tx, user).await?;
    let mut ledger = BulkUploadLedger::new(request.products.len());
    let mut first_touch: HashMap<ProductId, usize> = HashMap::new();

    for (position, payload) in request.products.iter().enumerate() {
        let index = position + 1;

        tx.savepoint(savepoints::PRODUCT).await?;
        match upsert_product(&mut tx, &context, options.match_mode, index, payload).await {
            Ok(outcome) => {
                tx.release_savepoint(savepoints::PRODUCT).await?;
                if let Some(duplicate_of) =
                    first_touch_of(&mut first_touch, outcome.product_id, index)
                {
                    ledger.duplicates.push(DuplicateItem {
                        index,
                        variation_index: None,
                        item_kind: ItemKind::Product,
                        duplicate_of,
                    });
                }
                outcome.merge_into(&mut ledger);
            }
            Err(err) => {
                tx.rollback_to_savepoint(savepoints::PRODUCT).await?;
                tx.release_savepoint(savepoints::PRODUCT).await?;
                ledger.record_failure(item_failure(index, None, ItemKind::Product, &err));
            }
        }
    }

    if ledger.applied() == 0 {
        tx.rollback().await?;
        ledger.mark_rolled_back();
        tracing::warn!(
            shop_id = %context.shop.id,
            failed = ledger.failed,
            "Bulk upload applied nothing, rolled back"
        );
        return Ok(ledger);
    }

    tx.commit().await?;
    ledger.success = true;
    tracing::info!(
        shop_id = %context.shop.id,
        created = ledger.created,
        updated = ledger.updated,
        failed = ledger.failed,
        variations_created = ledger.variations_created,
        variations_updated = ledger.variations_updated,
        variations_failed = ledger.variations_failed,
        "Bulk upload committed"
    );
    Ok(ledger)
}

/// What one successfully applied product contributes to the ledger.
///
/// Kept apart from the ledger until the product's savepoint is released, so
/// a product that fails late leaves no variation counts behind.
#[derive(Debug)]
struct ProductOutcome {
    product_id: ProductId,
    created: bool,
    variations_created: usize,
    variations_updated: usize,
    variation_ids: Vec<VariationId>,
    failures: Vec<ItemFailure>,
    duplicates: Vec<DuplicateItem>,
}

impl ProductOutcome {
    const fn new(product_id: ProductId, created: bool) -> Self {
        Self {
            product_id,
            created,
            variations_created: 0,
            variations_updated: 0,
            variation_ids: Vec::new(),
            failures: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    fn merge_into(self, ledger: &mut BulkUploadLedger) {
        if self.created {
            ledger.created += 1;
        } else {
            ledger.updated += 1;
        }
        if !ledger.product_ids.contains(&self.product_id) {
            ledger.product_ids.push(self.product_id);
        }

        ledger.variations_created += self.variations_created;
        ledger.variations_updated += self.variations_updated;
        for id in self.variation_ids {
            if !ledger.variation_ids.contains(&id) {
                ledger.variation_ids.push(id);
            }
        }
        for failure in self.failures {
            ledger.record_failure(failure);
        }
        ledger.duplicates.extend(self.duplicates);
    }
}

/// Records the first batch position that touched `id`.
///
/// Returns that earlier position when `id` was already touched, so items
/// resolved onto the same row are reported as duplicates of each other.
fn first_touch_of<K: Eq + Hash>(
    seen: &mut HashMap<K, usize>,
    id: K,
    position: usize,
) -> Option<usize> {
    match seen.entry(id) {
        Entry::Occupied(first) => Some(*first.get()),
        Entry::Vacant(slot) => {
            slot.insert(position);
            None
        }
    }
}

async fn upsert_product<T: InventoryTx>(
    tx: &mut T,
    context: &ShopContext,
    mode: VariationMatchMode,
    index: usize,
    payload: &ProductPayload,
) -> Result<ProductOutcome, ItemError> {
    let gender = validate_product(payload)?;

    if !tx.category_exists(payload.category_id).await? {
        return Err(ItemError::CategoryNotFound(payload.category_id));
    }

    let brand = non_empty(payload.brand.as_deref());
    let existing = match_product(tx, context.shop.id, &payload.name, brand).await?;

    let (product, created) = match existing {
        Some(found) => {
            let fields = ProductFields {
                category_id: payload.category_id,
                name: payload.name.clone(),
                description: payload.description.clone(),
                brand: brand.map(str::to_owned).or(found.brand),
                gender: gender.or(found.gender),
            };
            (tx.update_product(found.id, &fields).await?, false)
        }
        None => {
            let fields = ProductFields {
                category_id: payload.category_id,
                name: payload.name.clone(),
                description: payload.description.clone(),
                brand: brand.map(str::to_owned),
                gender,
            };
            (tx.insert_product(context.shop.id, &fields).await?, true)
        }
    };

    let mut outcome = ProductOutcome::new(product.id, created);
    let mut stored = if created {
        Vec::new()
    } else {
        tx.variations_for_product(product.id).await?
    };
    let mut first_touch: HashMap<VariationId, usize> = HashMap::new();

    for (position, variation) in payload.variations.iter().enumerate() {
        let variation_index = position + 1;

        tx.savepoint(savepoints::VARIATION).await?;
        match upsert_variation(tx, product.id, &stored, variation, mode).await {
            Ok((saved, inserted)) => {
                tx.release_savepoint(savepoints::VARIATION).await?;
                if let Some(duplicate_of) =
                    first_touch_of(&mut first_touch, saved.id, variation_index)
                {
                    outcome.duplicates.push(DuplicateItem {
                        index,
                        variation_index: Some(variation_index),
                        item_kind: ItemKind::Variation,
                        duplicate_of,
                    });
                }
                outcome.variation_ids.push(saved.id);
                if inserted {
                    outcome.variations_created += 1;
                    stored.push(saved);
                } else {
                    outcome.variations_updated += 1;
                    if let Some(slot) = stored.iter_mut().find(|v| v.id == saved.id) {
                        *slot = saved;
                    }
                }
            }
            Err(err) => {
                tx.rollback_to_savepoint(savepoints::VARIATION).await?;
                tx.release_savepoint(savepoints::VARIATION).await?;
                outcome.failures.push(item_failure(
                    index,
                    Some(variation_index),
                    ItemKind::Variation,
                    &err,
                ));
            }
        }
    }

    tx.refresh_product_availability(product.id).await?;
    Ok(outcome)
}

/// Returns the created or updated variation and whether it was created.
async fn upsert_variation<T: InventoryTx>(
    tx: &mut T,
    product: ProductId,
    stored: &[ProductVariation],
    payload: &VariationPayload,
    mode: VariationMatchMode,
) -> Result<(ProductVariation, bool), ItemError> {
    validate_variation(payload)?;

    let fields = VariationFields {
        sizes: payload.sizes.clone(),
        colors: payload.colors.clone(),
        price: payload.price,
        original_price: payload.original_price,
        discount: payload.discount,
        stock_quantity: payload.stock_quantity,
        sku: non_empty(payload.sku.as_deref()).map(str::to_owned),
        barcode: non_empty(payload.barcode.as_deref()).map(str::to_owned),
        image_urls: (!payload.image_urls.is_empty()).then(|| payload.image_urls.clone()),
        image_urls_by_color: (!payload.image_urls_by_color.is_empty())
            .then(|| payload.image_urls_by_color.clone()),
    };

    let matched = match_variation(
        stored,
        payload.barcode.as_deref(),
        &payload.sizes,
        &payload.colors,
        mode,
    )
    .map(|variation| variation.id);

    match matched {
        Some(id) => Ok((tx.update_variation(id, &fields).await?, false)),
        None => Ok((tx.insert_variation(product, &fields).await?, true)),
    }
}

/// Checks a product record and parses its gender tag.
fn validate_product(payload: &ProductPayload) -> Result<Option<Gender>, ItemError> {
    if payload.name.trim().is_empty() {
        return Err(ItemError::Validation("name is required".to_string()));
    }
    if payload.variations.is_empty() {
        return Err(ItemError::Validation(
            "at least one variation is required".to_string(),
        ));
    }

    non_empty(payload.gender.as_deref())
        .map(Gender::from_str)
        .transpose()
        .map_err(|err| ItemError::Validation(err.to_string()))
}

fn validate_variation(payload: &VariationPayload) -> Result<(), ItemError> {
    if payload.price < Decimal::ZERO {
        return Err(ItemError::Validation("price cannot be negative".to_string()));
    }
    if payload
        .original_price
        .is_some_and(|price| price < Decimal::ZERO)
    {
        return Err(ItemError::Validation(
            "original price cannot be negative".to_string(),
        ));
    }
    if payload.discount < Decimal::ZERO || payload.discount > MAX_DISCOUNT {
        return Err(ItemError::Validation(
            "discount must be between 0 and 100".to_string(),
        ));
    }
    if payload.stock_quantity < 0 {
        return Err(ItemError::Validation(
            "stock quantity cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
