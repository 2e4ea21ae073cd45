//! # Inventory Repository
//!
//! Reads over the append-only ledger plus manual adjustments. Purchases,
//! sales and returns post their own rows inside their transactions.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::repository::shared::{begin_write, fetch_product, post_movement, stock_of};
use mostrador_core::inventory::{build_kardex, check_adjustment, Kardex, StockLevel};
use mostrador_core::validation::validate_optional_text;
use mostrador_core::{InventoryMovement, LedgerOrigin};

/// A manual stock correction. `quantity` is signed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentInput {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Period of a kardex. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KardexRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Current stock of a product: the sum of its ledger rows.
    pub async fn stock(&self, product_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, product_id).await?;
        stock_of(&mut conn, product_id).await
    }

    /// Posts an `adjustment` row. The resulting stock may not go negative.
    pub async fn adjust(&self, input: &AdjustmentInput) -> DbResult<InventoryMovement> {
        validate_optional_text("notes", input.notes.as_deref(), 500)?;

        let mut tx = begin_write(&self.pool).await?;

        let product = fetch_product(&mut tx, &input.product_id).await?;
        let current = stock_of(&mut tx, &product.id).await?;
        let after = check_adjustment(&product.sku, current, input.quantity)?;

        let movement = post_movement(
            &mut tx,
            &product.id,
            LedgerOrigin::Adjustment,
            None,
            input.quantity,
            input.notes.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            Utc::now(),
        )
        .await?;

        tx.commit().await?;

        info!(
            sku = %product.sku,
            quantity = input.quantity,
            stock = after,
            "Inventory adjusted"
        );
        Ok(movement)
    }

    /// Stock of every active product, optionally only those at or below
    /// their minimum.
    pub async fn stock_levels(&self, low_only: bool) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku,
                p.name,
                p.unit,
                p.min_stock,
                COALESCE(SUM(m.quantity), 0) AS stock
            FROM products p
            LEFT JOIN inventory_movements m ON m.product_id = p.id
            WHERE p.status = 'active'
            GROUP BY p.id
            ORDER BY p.name, p.sku
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(levels
            .into_iter()
            .map(StockLevel::flagged)
            .filter(|l| !low_only || l.low_stock)
            .collect())
    }

    /// Chronological movements of a product with the running balance.
    pub async fn kardex(&self, product_id: &str, range: &KardexRange) -> DbResult<Kardex> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, product_id).await?;

        let opening: i64 = match range.from {
            Some(from) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements
                    WHERE product_id = ?1 AND created_at < ?2
                    "#,
                )
                .bind(product_id)
                .bind(from)
                .fetch_one(&mut *conn)
                .await?
            }
            None => 0,
        };

        let movements = sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT * FROM inventory_movements
            WHERE product_id = ?1
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at < ?3)
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(build_kardex(product_id, opening, &movements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures;
    use mostrador_core::{CoreError, MovementType};

    #[tokio::test]
    async fn test_adjust_never_below_zero() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 5).await;
        let inv = db.inventory();

        let m = inv
            .adjust(&AdjustmentInput {
                product_id: coke.id.clone(),
                quantity: -5,
                notes: Some("merma".into()),
            })
            .await
            .unwrap();
        assert_eq!(m.movement_type, MovementType::Adjustment);
        assert_eq!(inv.stock(&coke.id).await.unwrap(), 0);

        let err = inv
            .adjust(&AdjustmentInput {
                product_id: coke.id.clone(),
                quantity: -1,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));

        let err = inv
            .adjust(&AdjustmentInput {
                product_id: coke.id.clone(),
                quantity: 0,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let db = fixtures::db().await;
        fixtures::product(&db, "COKE-600", 1850, 5).await;

        assert!(sqlx::query("UPDATE inventory_movements SET quantity = 99")
            .execute(db.pool())
            .await
            .is_err());
        assert!(sqlx::query("DELETE FROM inventory_movements")
            .execute(db.pool())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stock_levels_flag_low_stock() {
        let db = fixtures::db().await;
        // fixtures set min_stock = 2
        fixtures::product(&db, "COKE-600", 1850, 10).await;
        fixtures::product(&db, "PEPSI-600", 1700, 2).await;
        fixtures::product(&db, "SPRITE-600", 1700, 0).await;

        let all = db.inventory().stock_levels(false).await.unwrap();
        assert_eq!(all.len(), 3);

        let low = db.inventory().stock_levels(true).await.unwrap();
        let skus: Vec<&str> = low.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(skus.len(), 2);
        assert!(skus.contains(&"PEPSI-600"));
        assert!(skus.contains(&"SPRITE-600"));
        assert!(low.iter().all(|l| l.low_stock));
    }

    #[tokio::test]
    async fn test_kardex_running_balance() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 12).await;
        let inv = db.inventory();

        let cut = Utc::now();
        inv.adjust(&AdjustmentInput {
            product_id: coke.id.clone(),
            quantity: 24,
            notes: None,
        })
        .await
        .unwrap();
        inv.adjust(&AdjustmentInput {
            product_id: coke.id.clone(),
            quantity: -1,
            notes: Some("botella rota".into()),
        })
        .await
        .unwrap();

        let full = inv.kardex(&coke.id, &KardexRange::default()).await.unwrap();
        assert_eq!(full.opening_balance, 0);
        assert_eq!(full.entries.len(), 3);
        assert_eq!(full.closing_balance, 35);

        let since = inv
            .kardex(
                &coke.id,
                &KardexRange {
                    from: Some(cut),
                    to: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(since.opening_balance, 12);
        let balances: Vec<i64> = since.entries.iter().map(|e| e.balance).collect();
        assert_eq!(balances, vec![36, 35]);
        assert_eq!(since.closing_balance, inv.stock(&coke.id).await.unwrap());
    }
}
