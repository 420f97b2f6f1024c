//! In-process inventory store.
//!
//! Holds the whole catalog behind one async mutex. A transaction keeps the
//! lock from `begin` until it is committed or dropped and works on a private
//! copy of the state, so transactions are fully serialized and an
//! uncommitted transaction leaves no trace. Savepoints are snapshots of the
//! private copy.
//!
//! Used by the test suites and for local experiments without `PostgreSQL`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockline_core::{CategoryId, ProductId, ShopId, UserId, VariationId, is_available};

use super::{InventoryStore, InventoryTx, RepositoryError};
use crate::models::{
    CurrentUser, Product, ProductFields, ProductVariation, Shop, StockFilter, StockRow,
    VariationFields, VariationOwnership,
};
use crate::services::auth::hash_api_token;

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: UserId,
    revoked: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sequences {
    user: i32,
    shop: i32,
    category: i32,
    product: i32,
    variation: i32,
}

impl Sequences {
    fn next(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, String>,
    tokens: HashMap<String, TokenRecord>,
    shops: BTreeMap<ShopId, Shop>,
    categories: BTreeMap<CategoryId, String>,
    products: BTreeMap<ProductId, Product>,
    variations: BTreeMap<VariationId, ProductVariation>,
    sequences: Sequences,
}

impl MemoryState {
    fn ownership(&self, id: VariationId) -> Option<VariationOwnership> {
        let variation = self.variations.get(&id)?;
        let product = self.products.get(&variation.product_id)?;
        Some(VariationOwnership {
            variation: variation.clone(),
            shop_id: product.shop_id,
        })
    }
}

/// Serializable in-memory [`InventoryStore`].
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user account.
    pub async fn add_user(&self, email: &str) -> UserId {
        let mut state = self.state.lock().await;
        let id = UserId::new(Sequences::next(&mut state.sequences.user));
        state.users.insert(id, email.to_owned());
        id
    }

    /// Register a plaintext API token for `user`. Only its hash is kept.
    pub async fn add_api_token(&self, user: UserId, token: &str) {
        let mut state = self.state.lock().await;
        state.tokens.insert(
            hash_api_token(token),
            TokenRecord {
                user_id: user,
                revoked: false,
            },
        );
    }

    /// Revoke a previously registered API token.
    pub async fn revoke_api_token(&self, token: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.tokens.get_mut(&hash_api_token(token)) {
            record.revoked = true;
        }
    }

    /// Register a shop owned by `owner`.
    pub async fn add_shop(&self, owner: UserId, name: &str) -> ShopId {
        let mut state = self.state.lock().await;
        let id = ShopId::new(Sequences::next(&mut state.sequences.shop));
        state.shops.insert(
            id,
            Shop {
                id,
                owner_id: owner,
                name: name.to_owned(),
            },
        );
        id
    }

    /// Register a catalog category.
    pub async fn add_category(&self, name: &str) -> CategoryId {
        let mut state = self.state.lock().await;
        let id = CategoryId::new(Sequences::next(&mut state.sequences.category));
        state.categories.insert(id, name.to_owned());
        id
    }

    /// All committed products, lowest id first.
    pub async fn products(&self) -> Vec<Product> {
        self.state.lock().await.products.values().cloned().collect()
    }

    /// All committed variations, lowest id first.
    pub async fn variations(&self) -> Vec<ProductVariation> {
        self.state.lock().await.variations.values().cloned().collect()
    }

    /// A committed variation.
    pub async fn variation(&self, id: VariationId) -> Option<ProductVariation> {
        self.state.lock().await.variations.get(&id).cloned()
    }
}

impl InventoryStore for MemoryInventoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            savepoints: Vec::new(),
        })
    }

    async fn user_for_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<CurrentUser>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .get(token_hash)
            .filter(|record| !record.revoked)
            .and_then(|record| {
                state.users.get(&record.user_id).map(|email| CurrentUser {
                    id: record.user_id,
                    email: email.clone(),
                })
            }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Transaction over a [`MemoryInventoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    savepoints: Vec<(&'static str, MemoryState)>,
}

impl MemoryTx {
    fn savepoint_position(&self, name: &'static str) -> Result<usize, RepositoryError> {
        self.savepoints
            .iter()
            .rposition(|(existing, _)| *existing == name)
            .ok_or_else(|| RepositoryError::Conflict(format!("savepoint {name} does not exist")))
    }
}

impl InventoryTx for MemoryTx {
    async fn shop_for_owner(&mut self, owner: UserId) -> Result<Option<Shop>, RepositoryError> {
        Ok(self
            .working
            .shops
            .values()
            .find(|shop| shop.owner_id == owner)
            .cloned())
    }

    async fn category_exists(&mut self, id: CategoryId) -> Result<bool, RepositoryError> {
        Ok(self.working.categories.contains_key(&id))
    }

    async fn find_products(
        &mut self,
        shop: ShopId,
        name: &str,
        brand: Option<&str>,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .working
            .products
            .values()
            .filter(|product| product.shop_id == shop && product.name == name)
            .filter(|product| brand.is_none_or(|brand| product.brand.as_deref() == Some(brand)))
            .cloned()
            .collect())
    }

    async fn insert_product(
        &mut self,
        shop: ShopId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let id = ProductId::new(Sequences::next(&mut self.working.sequences.product));
        let product = Product {
            id,
            shop_id: shop,
            category_id: fields.category_id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            brand: fields.brand.clone(),
            gender: fields.gender,
            is_available: false,
            created_at: now,
            updated_at: now,
        };
        self.working.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        product.category_id = fields.category_id;
        product.name.clone_from(&fields.name);
        product.description.clone_from(&fields.description);
        product.brand.clone_from(&fields.brand);
        product.gender = fields.gender;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn variations_for_product(
        &mut self,
        product: ProductId,
    ) -> Result<Vec<ProductVariation>, RepositoryError> {
        Ok(self
            .working
            .variations
            .values()
            .filter(|variation| variation.product_id == product)
            .cloned()
            .collect())
    }

    async fn insert_variation(
        &mut self,
        product: ProductId,
        fields: &VariationFields,
    ) -> Result<ProductVariation, RepositoryError> {
        if fields.stock_quantity < 0 {
            return Err(RepositoryError::Conflict(
                "stock quantity cannot be negative".to_string(),
            ));
        }
        if !self.working.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        let id = VariationId::new(Sequences::next(&mut self.working.sequences.variation));
        let variation = ProductVariation {
            id,
            product_id: product,
            sizes: fields.sizes.clone(),
            colors: fields.colors.clone(),
            price: fields.price,
            original_price: fields.original_price,
            discount: fields.discount,
            image_urls: fields.image_urls.clone().unwrap_or_default(),
            image_urls_by_color: fields.image_urls_by_color.clone().unwrap_or_default(),
            stock_quantity: fields.stock_quantity,
            is_available: is_available(fields.stock_quantity),
            sku: fields.sku.clone(),
            barcode: fields.barcode.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.variations.insert(id, variation.clone());
        Ok(variation)
    }

    async fn update_variation(
        &mut self,
        id: VariationId,
        fields: &VariationFields,
    ) -> Result<ProductVariation, RepositoryError> {
        if fields.stock_quantity < 0 {
            return Err(RepositoryError::Conflict(
                "stock quantity cannot be negative".to_string(),
            ));
        }
        let variation = self
            .working
            .variations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        variation.price = fields.price;
        if fields.original_price.is_some() {
            variation.original_price = fields.original_price;
        }
        variation.discount = fields.discount;
        variation.stock_quantity = fields.stock_quantity;
        variation.is_available = is_available(fields.stock_quantity);
        if let Some(sku) = &fields.sku {
            variation.sku = Some(sku.clone());
        }
        // A labelled variation keeps its barcode.
        if variation.barcode.as_deref().is_none_or(str::is_empty) {
            variation.barcode.clone_from(&fields.barcode);
        }
        if let Some(urls) = &fields.image_urls {
            variation.image_urls.clone_from(urls);
        }
        if let Some(by_color) = &fields.image_urls_by_color {
            variation.image_urls_by_color.clone_from(by_color);
        }
        variation.updated_at = Utc::now();
        Ok(variation.clone())
    }

    async fn find_variation(
        &mut self,
        id: VariationId,
    ) -> Result<Option<VariationOwnership>, RepositoryError> {
        Ok(self.working.ownership(id))
    }

    async fn lock_variation(
        &mut self,
        id: VariationId,
    ) -> Result<Option<VariationOwnership>, RepositoryError> {
        // The store-wide lock is already held for the whole transaction.
        Ok(self.working.ownership(id))
    }

    async fn decrement_stock(
        &mut self,
        id: VariationId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let Some(variation) = self.working.variations.get_mut(&id) else {
            return Ok(None);
        };
        if variation.stock_quantity < quantity {
            return Ok(None);
        }
        variation.stock_quantity -= quantity;
        variation.is_available = is_available(variation.stock_quantity);
        variation.updated_at = Utc::now();
        Ok(Some(variation.stock_quantity))
    }

    async fn set_stock(&mut self, id: VariationId, quantity: i32) -> Result<i32, RepositoryError> {
        if quantity < 0 {
            return Err(RepositoryError::Conflict(
                "stock quantity cannot be negative".to_string(),
            ));
        }
        let variation = self
            .working
            .variations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        variation.stock_quantity = quantity;
        variation.is_available = is_available(quantity);
        variation.updated_at = Utc::now();
        Ok(quantity)
    }

    async fn refresh_product_availability(
        &mut self,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        let available = self
            .working
            .variations
            .values()
            .any(|variation| variation.product_id == product && variation.stock_quantity > 0);
        if let Some(product) = self.working.products.get_mut(&product) {
            product.is_available = available;
        }
        Ok(())
    }

    async fn list_stock(
        &mut self,
        shop: ShopId,
        filter: &StockFilter,
    ) -> Result<Vec<StockRow>, RepositoryError> {
        let mut rows: Vec<StockRow> = self
            .working
            .variations
            .values()
            .filter_map(|variation| {
                let product = self.working.products.get(&variation.product_id)?;
                (product.shop_id == shop).then(|| StockRow {
                    variation_id: variation.id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    sku: variation.sku.clone(),
                    barcode: variation.barcode.clone(),
                    sizes: variation.sizes.clone(),
                    colors: variation.colors.clone(),
                    stock_quantity: variation.stock_quantity,
                    is_available: variation.is_available,
                })
            })
            .filter(|row| {
                filter
                    .barcode
                    .as_ref()
                    .is_none_or(|barcode| row.barcode.as_ref() == Some(barcode))
            })
            .filter(|row| {
                filter
                    .sku
                    .as_ref()
                    .is_none_or(|sku| row.sku.as_ref() == Some(sku))
            })
            .filter(|row| !filter.in_stock_only || row.stock_quantity > 0)
            .collect();
        rows.sort_by_key(|row| (row.product_id, row.variation_id));
        Ok(rows)
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        self.savepoints.push((name, self.working.clone()));
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        let position = self.savepoint_position(name)?;
        self.savepoints.truncate(position);
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        let position = self.savepoint_position(name)?;
        self.savepoints.truncate(position + 1);
        if let Some((_, snapshot)) = self.savepoints.last() {
            self.working = snapshot.clone();
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn fields(stock: i32) -> VariationFields {
        VariationFields {
            sizes: vec!["M".to_string()],
            colors: vec!["Red".to_string()],
            price: Decimal::new(1000, 2),
            original_price: None,
            discount: Decimal::ZERO,
            stock_quantity: stock,
            sku: None,
            barcode: None,
            image_urls: None,
            image_urls_by_color: None,
        }
    }

    async fn seeded() -> (MemoryInventoryStore, ShopId, CategoryId) {
        let store = MemoryInventoryStore::new();
        let owner = store.add_user("owner@example.com").await;
        let shop = store.add_shop(owner, "Corner Store").await;
        let category = store.add_category("Shirts").await;
        (store, shop, category)
    }

    fn product_fields(category: CategoryId) -> ProductFields {
        ProductFields {
            category_id: category,
            name: "Tee".to_string(),
            description: String::new(),
            brand: None,
            gender: None,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_leaves_no_trace() {
        let (store, shop, category) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(shop, &product_fields(category)).await.unwrap();
        drop(tx);

        assert!(store.products().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let (store, shop, category) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(shop, &product_fields(category)).await.unwrap();
        tx.insert_variation(product.id, &fields(4)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.products().await.len(), 1);
        let variations = store.variations().await;
        assert_eq!(variations.len(), 1);
        assert!(variations[0].is_available);
    }

    #[tokio::test]
    async fn test_rollback_to_savepoint_discards_only_later_writes() {
        let (store, shop, category) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(shop, &product_fields(category)).await.unwrap();
        tx.savepoint("outer").await.unwrap();
        tx.insert_variation(product.id, &fields(1)).await.unwrap();
        tx.rollback_to_savepoint("outer").await.unwrap();
        tx.release_savepoint("outer").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.products().await.len(), 1);
        assert!(store.variations().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_savepoint_is_an_error() {
        let (store, ..) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.rollback_to_savepoint("missing").await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_oversell() {
        let (store, shop, category) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(shop, &product_fields(category)).await.unwrap();
        let variation = tx.insert_variation(product.id, &fields(2)).await.unwrap();

        assert_eq!(tx.decrement_stock(variation.id, 3).await.unwrap(), None);
        assert_eq!(tx.decrement_stock(variation.id, 2).await.unwrap(), Some(0));
        let stored = tx.find_variation(variation.id).await.unwrap().unwrap();
        assert!(!stored.variation.is_available);
        assert_eq!(stored.shop_id, shop);
    }

    #[tokio::test]
    async fn test_token_lookup_ignores_revoked_tokens() {
        let store = MemoryInventoryStore::new();
        let user = store.add_user("till@example.com").await;
        store.add_api_token(user, "tok_live").await;

        let found = store
            .user_for_token_hash(&hash_api_token("tok_live"))
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user));

        store.revoke_api_token("tok_live").await;
        assert!(
            store
                .user_for_token_hash(&hash_api_token("tok_live"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
