//! Product and variation matching.
//!
//! Products are identified by `(shop, name, brand)`, brand only counting when
//! the incoming record supplies one. Variations are identified inside their
//! product by barcode first, then by their size and color lists.

use stockline_core::{ShopId, VariationMatchMode};

use crate::db::{InventoryTx, RepositoryError};
use crate::models::{Product, ProductVariation};

/// Find the stored product an incoming record refers to.
///
/// Several stored rows can share a key (e.g. a brand-less lookup over
/// branded rows); the lowest id wins and the ambiguity is logged.
///
/// # Errors
///
/// Returns `RepositoryError` if the lookup fails.
pub async fn match_product<T: InventoryTx>(
    tx: &mut T,
    shop: ShopId,
    name: &str,
    brand: Option<&str>,
) -> Result<Option<Product>, RepositoryError> {
    let brand = brand.filter(|brand| !brand.is_empty());
    let mut candidates = tx.find_products(shop, name, brand).await?;

    if candidates.len() > 1 {
        tracing::warn!(
            shop_id = %shop,
            name,
            brand,
            candidates = candidates.len(),
            chosen_product_id = %candidates[0].id,
            "Ambiguous product match, using lowest id"
        );
    }

    Ok(if candidates.is_empty() {
        None
    } else {
        Some(candidates.swap_remove(0))
    })
}

/// Find the stored variation an incoming one refers to.
///
/// A non-empty barcode equal to a stored barcode wins outright. Otherwise the
/// first variation whose sizes and colors match under `mode` is returned.
#[must_use]
pub fn match_variation<'a>(
    existing: &'a [ProductVariation],
    barcode: Option<&str>,
    sizes: &[String],
    colors: &[String],
    mode: VariationMatchMode,
) -> Option<&'a ProductVariation> {
    let by_barcode = barcode.filter(|code| !code.is_empty()).and_then(|code| {
        existing
            .iter()
            .find(|variation| variation.barcode.as_deref() == Some(code))
    });

    by_barcode.or_else(|| {
        existing.iter().find(|variation| {
            mode.same_variation(&variation.sizes, &variation.colors, sizes, colors)
        })
    })
}
