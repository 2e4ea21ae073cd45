//! # Purchase Repository
//!
//! Supplier purchases. A purchase is built as a draft and only touches stock
//! when it is confirmed.
//!
//! ## Lifecycle
//! ```text
//!   draft ──confirm──► confirmed     (one `entry` ledger row per line)
//!     │
//!     └───cancel────► cancelled     (no stock effect)
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{begin_write, clean, fetch_product, post_movement};
use mostrador_core::validation::{
    page_size, validate_amount_cents, validate_line_count, validate_optional_text,
    validate_quantity,
};
use mostrador_core::{
    CoreError, LedgerOrigin, Money, Purchase, PurchaseDetail, PurchaseItem, PurchaseStatus,
    Supplier, ValidationError,
};

/// One purchase line as submitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

impl PurchaseLineInput {
    fn validate(&self) -> DbResult<()> {
        validate_quantity(self.quantity)?;
        validate_amount_cents("unitCostCents", self.unit_cost_cents)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub supplier_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<PurchaseLineInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFilter {
    pub status: Option<PurchaseStatus>,
    pub supplier_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn fetch_purchase(conn: &mut SqliteConnection, id: &str) -> DbResult<Purchase> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Purchase", id))
}

async fn fetch_items(conn: &mut SqliteConnection, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY rowid",
    )
    .bind(purchase_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

fn ensure_draft(purchase: &Purchase, operation: &str) -> DbResult<()> {
    if purchase.status != PurchaseStatus::Draft {
        return Err(
            CoreError::invalid_status("Purchase", purchase.id.as_str(), purchase.status, operation)
                .into(),
        );
    }
    Ok(())
}

async fn insert_item(
    conn: &mut SqliteConnection,
    purchase_id: &str,
    line: &PurchaseLineInput,
) -> DbResult<PurchaseItem> {
    line.validate()?;
    fetch_product(&mut *conn, &line.product_id).await?;

    let line_total = Money::from_cents(line.unit_cost_cents)
        .checked_mul_quantity(line.quantity)
        .ok_or_else(|| ValidationError::AmountOverflow {
            field: "lineTotalCents".to_string(),
        })?;

    let item = PurchaseItem {
        id: Uuid::new_v4().to_string(),
        purchase_id: purchase_id.to_string(),
        product_id: line.product_id.clone(),
        quantity: line.quantity,
        unit_cost_cents: line.unit_cost_cents,
        line_total_cents: line_total.cents(),
    };

    sqlx::query(
        r#"
        INSERT INTO purchase_items (
            id, purchase_id, product_id, quantity, unit_cost_cents, line_total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&item.id)
    .bind(&item.purchase_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_cost_cents)
    .bind(item.line_total_cents)
    .execute(conn)
    .await?;

    Ok(item)
}

/// Recomputes the header total from the stored lines.
async fn refresh_total(
    conn: &mut SqliteConnection,
    purchase_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE purchases
        SET total_cents = (
                SELECT COALESCE(SUM(line_total_cents), 0)
                FROM purchase_items WHERE purchase_id = ?1
            ),
            updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(purchase_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Creates a draft purchase, optionally with its first lines.
    pub async fn create(&self, input: &NewPurchase) -> DbResult<PurchaseDetail> {
        validate_line_count(input.items.len(), true)?;
        validate_optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut tx = begin_write(&self.pool).await?;

        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(&input.supplier_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", input.supplier_id.as_str()))?;
        if !supplier.is_active {
            return Err(CoreError::InvalidOperation(format!(
                "supplier {} is inactive",
                supplier.name
            ))
            .into());
        }

        let now = Utc::now();
        let purchase_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO purchases (id, supplier_id, status, total_cents, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)
            "#,
        )
        .bind(&purchase_id)
        .bind(&supplier.id)
        .bind(PurchaseStatus::Draft)
        .bind(clean(input.notes.as_deref()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &input.items {
            insert_item(&mut tx, &purchase_id, line).await?;
        }
        refresh_total(&mut tx, &purchase_id, now).await?;

        let detail = PurchaseDetail {
            purchase: fetch_purchase(&mut tx, &purchase_id).await?,
            items: fetch_items(&mut tx, &purchase_id).await?,
        };
        tx.commit().await?;

        debug!(
            purchase_id = %purchase_id,
            supplier = %supplier.name,
            lines = detail.items.len(),
            "Purchase drafted"
        );
        Ok(detail)
    }

    pub async fn add_item(
        &self,
        purchase_id: &str,
        line: &PurchaseLineInput,
    ) -> DbResult<PurchaseDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let purchase = fetch_purchase(&mut tx, purchase_id).await?;
        ensure_draft(&purchase, "add items")?;

        let count = fetch_items(&mut tx, purchase_id).await?.len();
        validate_line_count(count + 1, false)?;

        insert_item(&mut tx, purchase_id, line).await?;
        refresh_total(&mut tx, purchase_id, Utc::now()).await?;

        let detail = PurchaseDetail {
            purchase: fetch_purchase(&mut tx, purchase_id).await?,
            items: fetch_items(&mut tx, purchase_id).await?,
        };
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn remove_item(&self, purchase_id: &str, item_id: &str) -> DbResult<PurchaseDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let purchase = fetch_purchase(&mut tx, purchase_id).await?;
        ensure_draft(&purchase, "remove items")?;

        let result = sqlx::query("DELETE FROM purchase_items WHERE id = ?1 AND purchase_id = ?2")
            .bind(item_id)
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PurchaseItem", item_id));
        }

        refresh_total(&mut tx, purchase_id, Utc::now()).await?;

        let detail = PurchaseDetail {
            purchase: fetch_purchase(&mut tx, purchase_id).await?,
            items: fetch_items(&mut tx, purchase_id).await?,
        };
        tx.commit().await?;
        Ok(detail)
    }

    /// Confirms a draft and receives its goods.
    ///
    /// ## Transaction
    /// 1. Purchase must be a draft with at least one line
    /// 2. One `entry` ledger row per line, origin `purchase`
    /// 3. Status → `confirmed`, `confirmed_at = now`
    pub async fn confirm(&self, id: &str) -> DbResult<PurchaseDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let purchase = fetch_purchase(&mut tx, id).await?;
        ensure_draft(&purchase, "confirm")?;

        let items = fetch_items(&mut tx, id).await?;
        if items.is_empty() {
            return Err(
                CoreError::InvalidOperation("cannot confirm a purchase without lines".into())
                    .into(),
            );
        }

        let now = Utc::now();
        for item in &items {
            post_movement(
                &mut tx,
                &item.product_id,
                LedgerOrigin::Purchase,
                Some(id),
                item.quantity,
                None,
                now,
            )
            .await?;
        }

        sqlx::query(
            "UPDATE purchases SET status = ?2, confirmed_at = ?3, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(PurchaseStatus::Confirmed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let detail = PurchaseDetail {
            purchase: fetch_purchase(&mut tx, id).await?,
            items,
        };
        tx.commit().await?;

        info!(
            purchase_id = %id,
            lines = detail.items.len(),
            total_cents = detail.purchase.total_cents,
            "Purchase confirmed"
        );
        Ok(detail)
    }

    /// Cancels a draft. Confirmed purchases cannot be cancelled.
    pub async fn cancel(&self, id: &str) -> DbResult<Purchase> {
        let mut tx = begin_write(&self.pool).await?;

        let purchase = fetch_purchase(&mut tx, id).await?;
        ensure_draft(&purchase, "cancel")?;

        sqlx::query("UPDATE purchases SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(PurchaseStatus::Cancelled)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let cancelled = fetch_purchase(&mut tx, id).await?;
        tx.commit().await?;

        info!(purchase_id = %id, "Purchase cancelled");
        Ok(cancelled)
    }

    pub async fn get(&self, id: &str) -> DbResult<PurchaseDetail> {
        let mut conn = self.pool.acquire().await?;
        Ok(PurchaseDetail {
            purchase: fetch_purchase(&mut conn, id).await?,
            items: fetch_items(&mut conn, id).await?,
        })
    }

    pub async fn list(&self, filter: &PurchaseFilter) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR supplier_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(filter.status)
        .bind(&filter.supplier_id)
        .bind(page_size(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::repository::supplier::SupplierInput;

    fn line(product_id: &str, quantity: i64, cost: i64) -> PurchaseLineInput {
        PurchaseLineInput {
            product_id: product_id.into(),
            quantity,
            unit_cost_cents: cost,
        }
    }

    #[tokio::test]
    async fn test_draft_lines_and_totals() {
        let db = fixtures::db().await;
        let supplier = fixtures::supplier(&db, "Bimbo").await;
        let pan = fixtures::product(&db, "PAN-BCO", 4500, 0).await;
        let repo = db.purchases();

        let draft = repo
            .create(&NewPurchase {
                supplier_id: supplier.id.clone(),
                notes: Some("pedido semanal".into()),
                items: vec![line(&pan.id, 10, 3200)],
            })
            .await
            .unwrap();
        assert_eq!(draft.purchase.status, PurchaseStatus::Draft);
        assert_eq!(draft.purchase.total_cents, 32_000);

        let with_two = repo.add_item(&draft.purchase.id, &line(&pan.id, 2, 100)).await.unwrap();
        assert_eq!(with_two.items.len(), 2);
        assert_eq!(with_two.purchase.total_cents, 32_200);

        let removed = repo
            .remove_item(&draft.purchase.id, &with_two.items[0].id)
            .await
            .unwrap();
        assert_eq!(removed.purchase.total_cents, 200);

        // Drafts do not move stock
        assert_eq!(db.inventory().stock(&pan.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirm_posts_entries() {
        let db = fixtures::db().await;
        let supplier = fixtures::supplier(&db, "Lala").await;
        let leche = fixtures::product(&db, "LECHE-1L", 2800, 3).await;
        let repo = db.purchases();

        let draft = repo
            .create(&NewPurchase {
                supplier_id: supplier.id,
                notes: None,
                items: vec![line(&leche.id, 12, 2100)],
            })
            .await
            .unwrap();

        let confirmed = repo.confirm(&draft.purchase.id).await.unwrap();
        assert_eq!(confirmed.purchase.status, PurchaseStatus::Confirmed);
        assert!(confirmed.purchase.confirmed_at.is_some());
        assert_eq!(db.inventory().stock(&leche.id).await.unwrap(), 15);

        // Confirmed purchases are frozen
        let err = repo.confirm(&draft.purchase.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
        let err = repo.cancel(&draft.purchase.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
        let err = repo
            .add_item(&draft.purchase.id, &line(&leche.id, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_confirm_without_lines_fails() {
        let db = fixtures::db().await;
        let supplier = fixtures::supplier(&db, "Sabritas").await;
        let draft = db
            .purchases()
            .create(&NewPurchase {
                supplier_id: supplier.id,
                notes: None,
                items: vec![],
            })
            .await
            .unwrap();

        let err = db.purchases().confirm(&draft.purchase.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOperation(_))));

        let cancelled = db.purchases().cancel(&draft.purchase.id).await.unwrap();
        assert_eq!(cancelled.status, PurchaseStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_inactive_or_missing_supplier() {
        let db = fixtures::db().await;
        let supplier = fixtures::supplier(&db, "Marinela").await;
        db.suppliers().deactivate(&supplier.id).await.unwrap();

        let err = db
            .purchases()
            .create(&NewPurchase {
                supplier_id: supplier.id,
                notes: None,
                items: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOperation(_))));

        let err = db
            .purchases()
            .create(&NewPurchase {
                supplier_id: "missing".into(),
                notes: None,
                items: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = fixtures::db().await;
        let a = fixtures::supplier(&db, "Coca-Cola FEMSA").await;
        let b = db
            .suppliers()
            .create(&SupplierInput {
                name: "Pepsico".into(),
                tax_id: None,
                contact_name: None,
                email: None,
                phone: None,
            })
            .await
            .unwrap();
        let repo = db.purchases();

        for supplier_id in [&a.id, &a.id, &b.id] {
            repo.create(&NewPurchase {
                supplier_id: supplier_id.clone(),
                notes: None,
                items: vec![],
            })
            .await
            .unwrap();
        }
        let first = repo.list(&PurchaseFilter::default()).await.unwrap();
        repo.cancel(&first[0].id).await.unwrap();

        let by_supplier = repo
            .list(&PurchaseFilter {
                supplier_id: Some(a.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_supplier.len(), 2);

        let cancelled = repo
            .list(&PurchaseFilter {
                status: Some(PurchaseStatus::Cancelled),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
    }
}
