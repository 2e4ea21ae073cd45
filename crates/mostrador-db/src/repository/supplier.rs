//! # Supplier Repository
//!
//! Suppliers. `name` is unique ignoring case; `tax_id` is unique when present.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{clean, like_pattern};
use mostrador_core::validation::{validate_email, validate_name, validate_optional_text};
use mostrador_core::{CoreError, Supplier};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl SupplierInput {
    fn validate(&self) -> DbResult<()> {
        validate_name(&self.name)?;
        validate_optional_text("taxId", self.tax_id.as_deref(), 20)?;
        validate_optional_text("contactName", self.contact_name.as_deref(), 200)?;
        validate_email(clean(self.email.as_deref()).as_deref())?;
        validate_optional_text("phone", self.phone.as_deref(), 30)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Checks name and tax id against every other supplier.
    async fn ensure_unique(
        &self,
        name: &str,
        tax_id: Option<&str>,
        except_id: Option<&str>,
    ) -> DbResult<()> {
        let name_owner: Option<String> =
            sqlx::query_scalar("SELECT id FROM suppliers WHERE name = ?1 COLLATE NOCASE")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        if matches!(name_owner, Some(ref id) if Some(id.as_str()) != except_id) {
            return Err(CoreError::duplicate("name", name).into());
        }

        if let Some(tax_id) = tax_id {
            let tax_owner: Option<String> =
                sqlx::query_scalar("SELECT id FROM suppliers WHERE tax_id = ?1")
                    .bind(tax_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if matches!(tax_owner, Some(ref id) if Some(id.as_str()) != except_id) {
                return Err(CoreError::duplicate("taxId", tax_id).into());
            }
        }

        Ok(())
    }

    pub async fn create(&self, input: &SupplierInput) -> DbResult<Supplier> {
        input.validate()?;
        let name = input.name.trim();
        let tax_id = clean(input.tax_id.as_deref());
        self.ensure_unique(name, tax_id.as_deref(), None).await?;

        let now = Utc::now();
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            tax_id,
            contact_name: clean(input.contact_name.as_deref()),
            email: clean(input.email.as_deref()),
            phone: clean(input.phone.as_deref()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, name, tax_id, contact_name, email, phone, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.tax_id)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(supplier)
    }

    pub async fn update(&self, id: &str, input: &SupplierInput) -> DbResult<Supplier> {
        input.validate()?;
        let name = input.name.trim();
        let tax_id = clean(input.tax_id.as_deref());
        self.ensure_unique(name, tax_id.as_deref(), Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = ?2, tax_id = ?3, contact_name = ?4, email = ?5, phone = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&tax_id)
        .bind(clean(input.contact_name.as_deref()))
        .bind(clean(input.email.as_deref()))
        .bind(clean(input.phone.as_deref()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Supplier> {
        sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn list(&self, filter: &SupplierFilter) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT * FROM suppliers
            WHERE (?1 IS NULL OR name LIKE ?1 OR tax_id LIKE ?1 OR contact_name LIKE ?1)
              AND (?2 OR is_active = 1)
            ORDER BY name
            "#,
        )
        .bind(like_pattern(filter.search.as_deref())?)
        .bind(filter.include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    /// Soft delete. Purchases keep pointing at the row.
    pub async fn deactivate(&self, id: &str) -> DbResult<Supplier> {
        let result =
            sqlx::query("UPDATE suppliers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        self.get(id).await
    }
}
