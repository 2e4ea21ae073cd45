//! # Product Repository
//!
//! Catalog products and their time-versioned prices.
//!
//! ## Key Operations
//! - CRUD with SKU uniqueness (create and update)
//! - Soft delete through `status = inactive`
//! - Price activation in one transaction (close old row, insert new row)
//!
//! ## Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list(search = "coca")                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WHERE sku LIKE '%coca%' OR name LIKE '%coca%'  (ASCII case-insensitive)│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COKE-600  | Coca-Cola 600ml   ← MATCH                                 │
//! │  COKE-2L   | Coca-Cola 2L      ← MATCH                                 │
//! │  PEPSI-600 | Pepsi 600ml                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{begin_write, clean, fetch_product, like_pattern};
use mostrador_core::pricing::activate_price;
use mostrador_core::validation::{
    page_size, validate_name, validate_non_negative, validate_optional_text, validate_sku,
    validate_tax_rate_bps,
};
use mostrador_core::{CoreError, PriceType, Product, ProductPrice, ProductStatus};

/// Fields of a new product. Also used as the full replacement on update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub tax_rate_bps: i64,
    #[serde(default)]
    pub min_stock: i64,
}

fn default_unit() -> String {
    "pza".to_string()
}

impl ProductInput {
    fn validate(&self) -> DbResult<()> {
        validate_sku(&self.sku)?;
        validate_name(&self.name)?;
        validate_optional_text("description", self.description.as_deref(), 1000)?;
        validate_optional_text("unit", Some(self.unit.as_str()), 20)?;
        validate_tax_rate_bps(self.tax_rate_bps)?;
        validate_non_negative("minStock", self.min_stock)?;
        Ok(())
    }
}

/// Filters for [`ProductRepository::list`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Repository for products and prices.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product. Duplicate SKU → `Duplicate`.
    pub async fn create(&self, input: &ProductInput) -> DbResult<Product> {
        input.validate()?;
        let sku = input.sku.trim();

        if self.find_by_sku(sku).await?.is_some() {
            return Err(CoreError::duplicate("sku", sku).into());
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: input.name.trim().to_string(),
            description: clean(input.description.as_deref()),
            unit: input.unit.trim().to_string(),
            tax_rate_bps: input.tax_rate_bps,
            min_stock: input.min_stock,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, unit, tax_rate_bps, min_stock,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.tax_rate_bps)
        .bind(product.min_stock)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Replaces the editable fields of a product. The SKU may change but must
    /// stay unique among the other products.
    pub async fn update(&self, id: &str, input: &ProductInput) -> DbResult<Product> {
        input.validate()?;
        let sku = input.sku.trim();

        if let Some(other) = self.find_by_sku(sku).await? {
            if other.id != id {
                return Err(CoreError::duplicate("sku", sku).into());
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = ?2, name = ?3, description = ?4, unit = ?5,
                tax_rate_bps = ?6, min_stock = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(sku)
        .bind(input.name.trim())
        .bind(clean(input.description.as_deref()))
        .bind(input.unit.trim())
        .bind(input.tax_rate_bps)
        .bind(input.min_stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    pub async fn find_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Product> {
        self.find_by_sku(sku)
            .await?
            .ok_or_else(|| DbError::not_found("Product", sku))
    }

    /// Lists products ordered by name, with optional search and status filter.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let pattern = like_pattern(filter.search.as_deref())?;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE (?1 IS NULL OR sku LIKE ?1 OR name LIKE ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY name, sku
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(pattern)
        .bind(filter.status)
        .bind(page_size(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Activates or deactivates a product. Products are never deleted since
    /// the ledger references them.
    pub async fn set_status(&self, id: &str, status: ProductStatus) -> DbResult<Product> {
        let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, status = %status, "Product status changed");
        self.get(id).await
    }

    // =========================================================================
    // Prices
    // =========================================================================

    /// Makes `price_cents` the active price of `price_type`.
    ///
    /// ## Transaction
    /// 1. Read the active row of that type
    /// 2. Close it (`is_active = 0`, `valid_to = now`)
    /// 3. Insert the new active row
    pub async fn set_price(
        &self,
        product_id: &str,
        price_type: PriceType,
        price_cents: i64,
    ) -> DbResult<ProductPrice> {
        let mut tx = begin_write(&self.pool).await?;

        fetch_product(&mut tx, product_id).await?;

        let current = sqlx::query_as::<_, ProductPrice>(
            "SELECT * FROM product_prices WHERE product_id = ?1 AND price_type = ?2 AND is_active = 1",
        )
        .bind(product_id)
        .bind(price_type)
        .fetch_optional(&mut *tx)
        .await?;

        let now = Utc::now();
        let plan = activate_price(
            current.as_ref(),
            product_id,
            price_type,
            price_cents,
            Uuid::new_v4().to_string(),
            now,
        )?;

        if let Some(close_id) = &plan.close_id {
            sqlx::query("UPDATE product_prices SET is_active = 0, valid_to = ?2 WHERE id = ?1")
                .bind(close_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let price = plan.new_price;
        sqlx::query(
            r#"
            INSERT INTO product_prices (
                id, product_id, price_type, price_cents, valid_from, valid_to, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&price.id)
        .bind(&price.product_id)
        .bind(price.price_type)
        .bind(price.price_cents)
        .bind(price.valid_from)
        .bind(price.valid_to)
        .bind(price.is_active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            price_type = %price_type,
            price_cents,
            "Price activated"
        );
        Ok(price)
    }

    /// The active row of each price type.
    pub async fn current_prices(&self, product_id: &str) -> DbResult<Vec<ProductPrice>> {
        self.get(product_id).await?;

        let prices = sqlx::query_as::<_, ProductPrice>(
            "SELECT * FROM product_prices WHERE product_id = ?1 AND is_active = 1 ORDER BY price_type",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(prices)
    }

    /// The active price of one type. Missing → `NoActivePrice`.
    pub async fn current_price(
        &self,
        product_id: &str,
        price_type: PriceType,
    ) -> DbResult<ProductPrice> {
        let product = self.get(product_id).await?;

        sqlx::query_as::<_, ProductPrice>(
            "SELECT * FROM product_prices WHERE product_id = ?1 AND price_type = ?2 AND is_active = 1",
        )
        .bind(product_id)
        .bind(price_type)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            CoreError::NoActivePrice {
                sku: product.sku,
                price_type: price_type.to_string(),
            }
            .into()
        })
    }

    /// Every price row, newest first, optionally of one type.
    pub async fn price_history(
        &self,
        product_id: &str,
        price_type: Option<PriceType>,
    ) -> DbResult<Vec<ProductPrice>> {
        self.get(product_id).await?;

        let prices = sqlx::query_as::<_, ProductPrice>(
            r#"
            SELECT * FROM product_prices
            WHERE product_id = ?1 AND (?2 IS NULL OR price_type = ?2)
            ORDER BY valid_from DESC, rowid DESC
            "#,
        )
        .bind(product_id)
        .bind(price_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(prices)
    }
}
