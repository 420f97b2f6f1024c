//! Catalog domain models: products and their stock-carrying variations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stockline_core::{CategoryId, Gender, ProductId, ShopId, VariationId};

/// A catalog product. Identified for matching by `(shop_id, name, brand)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Owning shop.
    pub shop_id: ShopId,
    /// Category reference.
    pub category_id: CategoryId,
    /// Product name (exact-match key).
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Optional brand (part of the match key when supplied).
    pub brand: Option<String>,
    /// Optional audience tag.
    pub gender: Option<Gender>,
    /// True when at least one variation has stock.
    pub is_available: bool,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A concrete sellable unit of a product, carrying its own price and stock.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductVariation {
    /// Unique variation ID.
    pub id: VariationId,
    /// Parent product.
    pub product_id: ProductId,
    /// Ordered size list.
    pub sizes: Vec<String>,
    /// Ordered color list.
    pub colors: Vec<String>,
    /// Selling price.
    pub price: Decimal,
    /// Price before discount, if any.
    pub original_price: Option<Decimal>,
    /// Discount percentage (0-100).
    pub discount: Decimal,
    /// Image URLs.
    pub image_urls: Vec<String>,
    /// Image URLs keyed by color.
    pub image_urls_by_color: BTreeMap<String, Vec<String>>,
    /// Units in stock, never negative.
    pub stock_quantity: i32,
    /// Derived: `stock_quantity > 0`.
    pub is_available: bool,
    /// Stock keeping unit.
    pub sku: Option<String>,
    /// Physical label barcode, the preferred match key.
    pub barcode: Option<String>,
    /// When the variation was created.
    pub created_at: DateTime<Utc>,
    /// When the variation was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A variation together with the shop that owns its product.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationOwnership {
    pub variation: ProductVariation,
    pub shop_id: ShopId,
}

/// Mutable product fields, written on both create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub brand: Option<String>,
    pub gender: Option<Gender>,
}

/// Variation fields written by a bulk upload.
///
/// On update, `None` in any of the optional overwrite fields keeps the stored
/// value, so a stock-only push never clobbers a photographed catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationFields {
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount: Decimal,
    pub stock_quantity: i32,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub image_urls_by_color: Option<BTreeMap<String, Vec<String>>>,
}

/// Filter for the shop-scoped stock listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockFilter {
    /// Only the variation with this exact barcode.
    pub barcode: Option<String>,
    /// Only the variation with this exact SKU.
    pub sku: Option<String>,
    /// Only variations with stock > 0.
    pub in_stock_only: bool,
}

/// One row of the stock listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRow {
    pub variation_id: VariationId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock_quantity: i32,
    pub is_available: bool,
}
