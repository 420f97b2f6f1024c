//! Request payloads posted by POS clients.
//!
//! Field names follow the POS wire format (camelCase). Optional fields default
//! so a terse client can omit them; semantic validation happens per item in
//! the services, not at deserialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use stockline_core::{CategoryId, VariationId};

/// Body of `POST /pos/products/bulk-upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkUploadRequest {
    pub products: Vec<ProductPayload>,
}

/// One product of a bulk upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub category_id: CategoryId,
    /// Parsed per item so an unknown tag fails only this product.
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub variations: Vec<VariationPayload>,
}

/// One variation of an uploaded product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationPayload {
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub image_urls_by_color: BTreeMap<String, Vec<String>>,
}

/// Body of `POST /pos/sales/sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleSyncRequest {
    pub sales: Vec<SaleEvent>,
}

/// A completed sale reported by a POS client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEvent {
    pub variation_id: VariationId,
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub price: Decimal,
    /// Defaults to the time the sync is processed.
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
}

/// Query string of `GET /pos/products/stock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockQuery {
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub in_stock: Option<bool>,
}

/// Body of `PUT /pos/products/{variationId}/stock`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateRequest {
    pub stock_quantity: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_upload_defaults_optional_fields() {
        let body: BulkUploadRequest = serde_json::from_value(serde_json::json!({
            "products": [{
                "name": "Linen Shirt",
                "categoryId": 3,
                "variations": [{ "price": 19.5 }]
            }]
        }))
        .unwrap();

        let product = &body.products[0];
        assert_eq!(product.category_id, CategoryId::new(3));
        assert!(product.brand.is_none());
        assert!(product.gender.is_none());

        let variation = &product.variations[0];
        assert_eq!(variation.price, Decimal::new(195, 1));
        assert_eq!(variation.discount, Decimal::ZERO);
        assert_eq!(variation.stock_quantity, 0);
        assert!(variation.sizes.is_empty());
        assert!(variation.image_urls_by_color.is_empty());
    }

    #[test]
    fn test_sale_event_accepts_string_price_and_date() {
        let sale: SaleEvent = serde_json::from_value(serde_json::json!({
            "variationId": 12,
            "quantity": 2,
            "price": "4.99",
            "saleDate": "2026-03-01T10:15:00Z"
        }))
        .unwrap();

        assert_eq!(sale.variation_id, VariationId::new(12));
        assert_eq!(sale.price, Decimal::new(499, 2));
        assert!(sale.sale_date.is_some());
        assert!(sale.size.is_none());
    }

    #[test]
    fn test_missing_category_is_malformed() {
        let result: Result<BulkUploadRequest, _> = serde_json::from_value(serde_json::json!({
            "products": [{ "name": "No Category" }]
        }));
        assert!(result.is_err());
    }
}
