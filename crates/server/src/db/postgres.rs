//! `PostgreSQL` backend.
//!
//! Queries are checked at runtime (`query_as::<_, Row>`) against the `pos`
//! schema created by `crates/server/migrations`. Rows are read into internal
//! `FromRow` structs and converted into domain models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use stockline_core::{
    CategoryId, Gender, ProductId, ShopId, UserId, VariationId,
};

use super::{InventoryStore, InventoryTx, RepositoryError};
use crate::models::{
    CurrentUser, Product, ProductFields, ProductVariation, Shop, StockFilter, StockRow,
    VariationFields, VariationOwnership,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
}

impl From<UserRow> for CurrentUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: i32,
    owner_id: i32,
    name: String,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: ShopId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    shop_id: i32,
    category_id: i32,
    name: String,
    description: String,
    brand: Option<String>,
    gender: Option<Gender>,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            shop_id: ShopId::new(row.shop_id),
            category_id: CategoryId::new(row.category_id),
            name: row.name,
            description: row.description,
            brand: row.brand,
            gender: row.gender,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariationRow {
    id: i32,
    product_id: i32,
    sizes: Vec<String>,
    colors: Vec<String>,
    price: Decimal,
    original_price: Option<Decimal>,
    discount: Decimal,
    image_urls: Vec<String>,
    image_urls_by_color: Json<BTreeMap<String, Vec<String>>>,
    stock_quantity: i32,
    is_available: bool,
    sku: Option<String>,
    barcode: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VariationRow> for ProductVariation {
    fn from(row: VariationRow) -> Self {
        Self {
            id: VariationId::new(row.id),
            product_id: ProductId::new(row.product_id),
            sizes: row.sizes,
            colors: row.colors,
            price: row.price,
            original_price: row.original_price,
            discount: row.discount,
            image_urls: row.image_urls,
            image_urls_by_color: row.image_urls_by_color.0,
            stock_quantity: row.stock_quantity,
            is_available: row.is_available,
            sku: row.sku,
            barcode: row.barcode,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OwnedVariationRow {
    #[sqlx(flatten)]
    variation: VariationRow,
    shop_id: i32,
}

impl From<OwnedVariationRow> for VariationOwnership {
    fn from(row: OwnedVariationRow) -> Self {
        Self {
            variation: row.variation.into(),
            shop_id: ShopId::new(row.shop_id),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRowRecord {
    variation_id: i32,
    product_id: i32,
    product_name: String,
    sku: Option<String>,
    barcode: Option<String>,
    sizes: Vec<String>,
    colors: Vec<String>,
    stock_quantity: i32,
    is_available: bool,
}

impl From<StockRowRecord> for StockRow {
    fn from(row: StockRowRecord) -> Self {
        Self {
            variation_id: VariationId::new(row.variation_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            sku: row.sku,
            barcode: row.barcode,
            sizes: row.sizes,
            colors: row.colors,
            stock_quantity: row.stock_quantity,
            is_available: row.is_available,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, shop_id, category_id, name, description, brand, gender, \
     is_available, created_at, updated_at";

const VARIATION_COLUMNS: &str = "id, product_id, sizes, colors, price, original_price, discount, \
     image_urls, image_urls_by_color, stock_quantity, is_available, sku, barcode, \
     created_at, updated_at";

/// Map a check-constraint violation to `Conflict`, everything else to `Database`.
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_check_violation()
    {
        return RepositoryError::Conflict(db_err.message().to_string());
    }
    RepositoryError::Database(err)
}

/// Savepoint names are interpolated into SQL, so only identifiers are accepted.
fn savepoint_ident(name: &str) -> Result<&str, RepositoryError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(RepositoryError::Conflict(format!(
            "invalid savepoint name: {name}"
        )))
    }
}

/// [`InventoryStore`] backed by a `PgPool`.
#[derive(Debug, Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl InventoryStore for PgInventoryStore {
    type Tx = PgInventoryTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgInventoryTx { tx })
    }

    async fn user_for_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<CurrentUser>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.email
            FROM pos.api_tokens t
            JOIN pos.users u ON u.id = t.user_id
            WHERE t.token_hash = $1 AND t.revoked_at IS NULL
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            sqlx::query(
                "UPDATE pos.api_tokens SET last_used_at = NOW() WHERE token_hash = $1",
            )
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        }

        Ok(row.map(Into::into))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A `PostgreSQL` transaction. Dropping it without commit rolls back.
pub struct PgInventoryTx {
    tx: Transaction<'static, Postgres>,
}

impl InventoryTx for PgInventoryTx {
    async fn shop_for_owner(&mut self, owner: UserId) -> Result<Option<Shop>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, owner_id, name FROM pos.shops WHERE owner_id = $1",
        )
        .bind(owner)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn category_exists(&mut self, id: CategoryId) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pos.categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn find_products(
        &mut self,
        shop: ShopId,
        name: &str,
        brand: Option<&str>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM pos.products
            WHERE shop_id = $1 AND name = $2 AND ($3::text IS NULL OR brand = $3)
            ORDER BY id
            "
        ))
        .bind(shop)
        .bind(name)
        .bind(brand)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_product(
        &mut self,
        shop: ShopId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO pos.products (shop_id, category_id, name, description, brand, gender)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(shop)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.brand)
        .bind(fields.gender)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE pos.products
            SET category_id = $2, name = $3, description = $4, brand = $5, gender = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.brand)
        .bind(fields.gender)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn variations_for_product(
        &mut self,
        product: ProductId,
    ) -> Result<Vec<ProductVariation>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariationRow>(&format!(
            "SELECT {VARIATION_COLUMNS} FROM pos.product_variations WHERE product_id = $1 ORDER BY id"
        ))
        .bind(product)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_variation(
        &mut self,
        product: ProductId,
        fields: &VariationFields,
    ) -> Result<ProductVariation, RepositoryError> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r"
            INSERT INTO pos.product_variations (
                product_id, sizes, colors, price, original_price, discount,
                image_urls, image_urls_by_color, stock_quantity, sku, barcode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {VARIATION_COLUMNS}
            "
        ))
        .bind(product)
        .bind(&fields.sizes)
        .bind(&fields.colors)
        .bind(fields.price)
        .bind(fields.original_price)
        .bind(fields.discount)
        .bind(fields.image_urls.clone().unwrap_or_default())
        .bind(Json(fields.image_urls_by_color.clone().unwrap_or_default()))
        .bind(fields.stock_quantity)
        .bind(&fields.sku)
        .bind(&fields.barcode)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn update_variation(
        &mut self,
        id: VariationId,
        fields: &VariationFields,
    ) -> Result<ProductVariation, RepositoryError> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r"
            UPDATE pos.product_variations
            SET price = $2,
                original_price = COALESCE($3, original_price),
                discount = $4,
                stock_quantity = $5,
                sku = COALESCE($6, sku),
                barcode = COALESCE(NULLIF(barcode, ''), $7),
                image_urls = COALESCE($8, image_urls),
                image_urls_by_color = COALESCE($9, image_urls_by_color),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VARIATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(fields.price)
        .bind(fields.original_price)
        .bind(fields.discount)
        .bind(fields.stock_quantity)
        .bind(&fields.sku)
        .bind(&fields.barcode)
        .bind(&fields.image_urls)
        .bind(fields.image_urls_by_color.clone().map(Json))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn find_variation(
        &mut self,
        id: VariationId,
    ) -> Result<Option<VariationOwnership>, RepositoryError> {
        let row = sqlx::query_as::<_, OwnedVariationRow>(
            r"
            SELECT v.id, v.product_id, v.sizes, v.colors, v.price, v.original_price,
                   v.discount, v.image_urls, v.image_urls_by_color, v.stock_quantity,
                   v.is_available, v.sku, v.barcode, v.created_at, v.updated_at,
                   p.shop_id
            FROM pos.product_variations v
            JOIN pos.products p ON p.id = v.product_id
            WHERE v.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn lock_variation(
        &mut self,
        id: VariationId,
    ) -> Result<Option<VariationOwnership>, RepositoryError> {
        let row = sqlx::query_as::<_, OwnedVariationRow>(
            r"
            SELECT v.id, v.product_id, v.sizes, v.colors, v.price, v.original_price,
                   v.discount, v.image_urls, v.image_urls_by_color, v.stock_quantity,
                   v.is_available, v.sku, v.barcode, v.created_at, v.updated_at,
                   p.shop_id
            FROM pos.product_variations v
            JOIN pos.products p ON p.id = v.product_id
            WHERE v.id = $1
            FOR UPDATE OF v
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn decrement_stock(
        &mut self,
        id: VariationId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE pos.product_variations
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity >= $2
            RETURNING stock_quantity
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(remaining)
    }

    async fn set_stock(&mut self, id: VariationId, quantity: i32) -> Result<i32, RepositoryError> {
        let stored: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE pos.product_variations
            SET stock_quantity = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock_quantity
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;
        stored.ok_or(RepositoryError::NotFound)
    }

    async fn refresh_product_availability(
        &mut self,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE pos.products
            SET is_available = EXISTS (
                SELECT 1 FROM pos.product_variations
                WHERE product_id = $1 AND stock_quantity > 0
            )
            WHERE id = $1
            ",
        )
        .bind(product)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_stock(
        &mut self,
        shop: ShopId,
        filter: &StockFilter,
    ) -> Result<Vec<StockRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockRowRecord>(
            r"
            SELECT v.id AS variation_id, p.id AS product_id, p.name AS product_name,
                   v.sku, v.barcode, v.sizes, v.colors, v.stock_quantity, v.is_available
            FROM pos.product_variations v
            JOIN pos.products p ON p.id = v.product_id
            WHERE p.shop_id = $1
              AND ($2::text IS NULL OR v.barcode = $2)
              AND ($3::text IS NULL OR v.sku = $3)
              AND (NOT $4 OR v.stock_quantity > 0)
            ORDER BY p.id, v.id
            ",
        )
        .bind(shop)
        .bind(&filter.barcode)
        .bind(&filter.sku)
        .bind(filter.in_stock_only)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        let sql = format!("SAVEPOINT {}", savepoint_ident(name)?);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        let sql = format!("RELEASE SAVEPOINT {}", savepoint_ident(name)?);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), RepositoryError> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", savepoint_ident(name)?);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
