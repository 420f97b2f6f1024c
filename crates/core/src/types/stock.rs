//! Stock bookkeeping types.

use serde::{Deserialize, Serialize};

use super::id::VariationId;

/// Availability derived from a stock quantity.
///
/// A variation is available exactly when it has at least one unit in stock.
#[must_use]
pub const fn is_available(stock_quantity: i32) -> bool {
    stock_quantity > 0
}

/// Before/after record of a single stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub variation_id: VariationId,
    pub old_quantity: i32,
    pub new_quantity: i32,
}

impl StockChange {
    /// Whether the variation is still sellable after the change.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        is_available(self.new_quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_threshold() {
        assert!(!is_available(0));
        assert!(is_available(1));
        assert!(!is_available(-1));
    }

    #[test]
    fn test_stock_change_wire_format() {
        let change = StockChange {
            variation_id: VariationId::new(9),
            old_quantity: 10,
            new_quantity: 3,
        };
        assert!(change.is_available());
        assert_eq!(
            serde_json::to_value(change).unwrap(),
            serde_json::json!({ "variationId": 9, "oldQuantity": 10, "newQuantity": 3 })
        );
    }
}
