//! Per-request outcome reports ("ledgers") returned to POS clients.
//!
//! A ledger is always returned, even when the batch was rolled back, so the
//! client can re-drive exactly the items that did not apply. Item positions
//! are 1-indexed in submission order.

use core::fmt;

use serde::Serialize;

use stockline_core::{ProductId, StockChange, VariationId};

/// What kind of batch item a failure or duplicate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    Variation,
    Sale,
}

/// Stable machine-readable reason for an item-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    CategoryNotFound,
    ValidationError,
    NotFound,
    OwnershipViolation,
    InsufficientStock,
    PersistenceError,
}

/// One failed batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    /// 1-based position of the product or sale in the batch.
    pub index: usize,
    /// 1-based position of the variation inside its product, for variation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_index: Option<usize>,
    pub item_kind: ItemKind,
    pub code: FailureCode,
    pub error: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.item_kind, self.variation_index) {
            (ItemKind::Variation, Some(variation)) => write!(
                f,
                "Product {}, variation {}: {}",
                self.index, variation, self.error
            ),
            (ItemKind::Sale, _) => write!(f, "Sale {}: {}", self.index, self.error),
            _ => write!(f, "Product {}: {}", self.index, self.error),
        }
    }
}

/// A batch item whose matching key repeats an earlier item of the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateItem {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_index: Option<usize>,
    pub item_kind: ItemKind,
    /// Position of the earlier item with the same key (variation position
    /// for variation duplicates, product position otherwise).
    pub duplicate_of: usize,
}

/// Outcome of a bulk product upload.
///
/// `created + updated + failed == total_items` always holds; variation
/// outcomes are counted separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadLedger {
    pub success: bool,
    pub total_items: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub variations_created: usize,
    pub variations_updated: usize,
    pub variations_failed: usize,
    pub errors: Vec<String>,
    pub failures: Vec<ItemFailure>,
    pub duplicates: Vec<DuplicateItem>,
    pub product_ids: Vec<ProductId>,
    pub variation_ids: Vec<VariationId>,
}

impl BulkUploadLedger {
    /// Empty ledger for a batch of `total_items` products.
    #[must_use]
    pub const fn new(total_items: usize) -> Self {
        Self {
            success: false,
            total_items,
            created: 0,
            updated: 0,
            failed: 0,
            variations_created: 0,
            variations_updated: 0,
            variations_failed: 0,
            errors: Vec::new(),
            failures: Vec::new(),
            duplicates: Vec::new(),
            product_ids: Vec::new(),
            variation_ids: Vec::new(),
        }
    }

    /// Number of products that were created or updated.
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.created + self.updated
    }

    /// Record a failed product or variation, keeping the counters in step.
    pub fn record_failure(&mut self, failure: ItemFailure) {
        match failure.item_kind {
            ItemKind::Variation => self.variations_failed += 1,
            ItemKind::Product | ItemKind::Sale => self.failed += 1,
        }
        self.errors.push(failure.to_string());
        self.failures.push(failure);
    }

    /// Clear everything that describes applied writes after a rollback.
    ///
    /// Failures and duplicates are kept so the client can still see why
    /// nothing applied.
    pub fn mark_rolled_back(&mut self) {
        self.success = false;
        self.product_ids.clear();
        self.variation_ids.clear();
    }
}

/// Outcome of a sales sync.
///
/// `processed + failed == total_sales` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSyncLedger {
    pub success: bool,
    pub total_sales: usize,
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub failures: Vec<ItemFailure>,
    pub updated_stock: Vec<StockChange>,
}

impl SaleSyncLedger {
    /// Empty ledger for a batch of `total_sales` events.
    #[must_use]
    pub const fn new(total_sales: usize) -> Self {
        Self {
            success: false,
            total_sales,
            processed: 0,
            failed: 0,
            errors: Vec::new(),
            failures: Vec::new(),
            updated_stock: Vec::new(),
        }
    }

    /// Record an applied sale.
    pub fn record_processed(&mut self, change: StockChange) {
        self.processed += 1;
        self.updated_stock.push(change);
    }

    /// Record a rejected sale.
    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.failed += 1;
        self.errors.push(failure.to_string());
        self.failures.push(failure);
    }

    /// Drop the stock changes after a rollback; none of them persisted.
    pub fn mark_rolled_back(&mut self) {
        self.success = false;
        self.updated_stock.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failure(kind: ItemKind, index: usize, variation_index: Option<usize>) -> ItemFailure {
        ItemFailure {
            index,
            variation_index,
            item_kind: kind,
            code: FailureCode::ValidationError,
            error: "bad input".to_string(),
        }
    }

    #[test]
    fn test_failure_messages_are_one_indexed_and_scoped() {
        assert_eq!(
            failure(ItemKind::Product, 2, None).to_string(),
            "Product 2: bad input"
        );
        assert_eq!(
            failure(ItemKind::Variation, 2, Some(3)).to_string(),
            "Product 2, variation 3: bad input"
        );
        assert_eq!(failure(ItemKind::Sale, 1, None).to_string(), "Sale 1: bad input");
    }

    #[test]
    fn test_variation_failures_do_not_count_as_failed_products() {
        let mut ledger = BulkUploadLedger::new(1);
        ledger.record_failure(failure(ItemKind::Variation, 1, Some(1)));
        assert_eq!(ledger.failed, 0);
        assert_eq!(ledger.variations_failed, 1);
        assert_eq!(ledger.errors.len(), 1);

        ledger.record_failure(failure(ItemKind::Product, 1, None));
        assert_eq!(ledger.failed, 1);
        assert_eq!(ledger.errors.len(), 2);
    }

    #[test]
    fn test_bulk_ledger_wire_format() {
        let mut ledger = BulkUploadLedger::new(2);
        ledger.success = true;
        ledger.created = 1;
        ledger.product_ids.push(ProductId::new(4));
        ledger.record_failure(ItemFailure {
            index: 2,
            variation_index: None,
            item_kind: ItemKind::Product,
            code: FailureCode::CategoryNotFound,
            error: "category 9 not found".to_string(),
        });

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["totalItems"], 2);
        assert_eq!(json["productIds"], serde_json::json!([4]));
        assert_eq!(json["errors"][0], "Product 2: category 9 not found");
        assert_eq!(json["failures"][0]["code"], "CATEGORY_NOT_FOUND");
        assert_eq!(json["failures"][0]["itemKind"], "product");
        assert!(json["failures"][0].get("variationIndex").is_none());
    }

    #[test]
    fn test_sale_ledger_rollback_drops_stock_changes() {
        let mut ledger = SaleSyncLedger::new(1);
        ledger.record_processed(StockChange {
            variation_id: VariationId::new(1),
            old_quantity: 5,
            new_quantity: 4,
        });
        ledger.mark_rolled_back();
        assert!(ledger.updated_stock.is_empty());
        assert_eq!(ledger.processed, 1);
    }
}
