//! # Client Repository
//!
//! Customers. `tax_id` (RFC) is unique when present.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{clean, like_pattern};
use mostrador_core::validation::{page_size, validate_email, validate_name, validate_optional_text};
use mostrador_core::{Client, CoreError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ClientInput {
    fn validate(&self) -> DbResult<()> {
        validate_name(&self.name)?;
        validate_optional_text("taxId", self.tax_id.as_deref(), 20)?;
        validate_email(clean(self.email.as_deref()).as_deref())?;
        validate_optional_text("phone", self.phone.as_deref(), 30)?;
        validate_optional_text("address", self.address.as_deref(), 500)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    async fn ensure_tax_id_free(&self, tax_id: Option<&str>, except_id: Option<&str>) -> DbResult<()> {
        let Some(tax_id) = tax_id else {
            return Ok(());
        };
        let owner: Option<String> = sqlx::query_scalar("SELECT id FROM clients WHERE tax_id = ?1")
            .bind(tax_id)
            .fetch_optional(&self.pool)
            .await?;

        match owner {
            Some(id) if Some(id.as_str()) != except_id => {
                Err(CoreError::duplicate("taxId", tax_id).into())
            }
            _ => Ok(()),
        }
    }

    pub async fn create(&self, input: &ClientInput) -> DbResult<Client> {
        input.validate()?;
        let tax_id = clean(input.tax_id.as_deref());
        self.ensure_tax_id_free(tax_id.as_deref(), None).await?;

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            tax_id,
            email: clean(input.email.as_deref()),
            phone: clean(input.phone.as_deref()),
            address: clean(input.address.as_deref()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(name = %client.name, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clients (
                id, name, tax_id, email, phone, address, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.tax_id)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(client.is_active)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn update(&self, id: &str, input: &ClientInput) -> DbResult<Client> {
        input.validate()?;
        let tax_id = clean(input.tax_id.as_deref());
        self.ensure_tax_id_free(tax_id.as_deref(), Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE clients
            SET name = ?2, tax_id = ?3, email = ?4, phone = ?5, address = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&tax_id)
        .bind(clean(input.email.as_deref()))
        .bind(clean(input.phone.as_deref()))
        .bind(clean(input.address.as_deref()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }

    pub async fn list(&self, filter: &ClientFilter) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE (?1 IS NULL OR name LIKE ?1 OR tax_id LIKE ?1 OR email LIKE ?1)
              AND (?2 OR is_active = 1)
            ORDER BY name
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(like_pattern(filter.search.as_deref())?)
        .bind(filter.include_inactive)
        .bind(page_size(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    /// Soft delete.
    pub async fn deactivate(&self, id: &str) -> DbResult<Client> {
        let result = sqlx::query("UPDATE clients SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn input(name: &str, tax_id: Option<&str>) -> ClientInput {
        ClientInput {
            name: name.into(),
            tax_id: tax_id.map(Into::into),
            email: Some("compras@cliente.mx".into()),
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_tax_id_unique_when_present() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();

        let a = repo.create(&input("Abarrotes Lupita", Some("LUAB800101AAA"))).await.unwrap();
        repo.create(&input("Sin RFC 1", None)).await.unwrap();
        repo.create(&input("Sin RFC 2", Some("  "))).await.unwrap();

        let err = repo
            .create(&input("Otra", Some("LUAB800101AAA")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Duplicate { .. })));

        let updated = repo
            .update(&a.id, &input("Abarrotes Lupita SA", Some("LUAB800101AAA")))
            .await
            .unwrap();
        assert_eq!(updated.name, "Abarrotes Lupita SA");
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_default_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();
        let a = repo.create(&input("Mostrador", None)).await.unwrap();
        repo.create(&input("Fonda Doña Mary", None)).await.unwrap();

        assert!(!repo.deactivate(&a.id).await.unwrap().is_active);

        let active = repo.list(&ClientFilter::default()).await.unwrap();
        assert_eq!(active.len(), 1);

        let all = repo
            .list(&ClientFilter {
                include_inactive: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.clients().get("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
