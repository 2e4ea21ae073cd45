//! # Return Repository
//!
//! Partial and full returns of paid sales.
//!
//! ## Register
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register(sale, [{sale_item, qty}], restock, refund_method?, shift?)   │
//! │       │                                                                 │
//! │       ├── sale paid?                         no → InvalidStatus        │
//! │       ├── qty ≤ sold − already returned?     no → ReturnExceedsSold    │
//! │       ├── given shift open?                  no → ShiftClosed          │
//! │       │                                                                 │
//! │       ├── INSERT returns, return_items                                 │
//! │       ├── restock → INSERT inventory_movements (entry, origin return)  │
//! │       ├── cash refund on a shift → cash expense (origin return)        │
//! │       └── every line fully returned → sale.status = returned           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without an explicit shift, the refund goes to the sale's shift while that
//! shift is still open; otherwise it touches no drawer.

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::sale::{fetch_sale, fetch_sale_items};
use crate::repository::shared::{begin_write, fetch_shift, post_cash_movement, post_movement};
use mostrador_core::returns::{ensure_returnable, plan_return, ReturnLineRequest};
use mostrador_core::shift::ensure_open;
use mostrador_core::validation::{validate_line_count, validate_required_text};
use mostrador_core::{
    CashMovementType, CashOrigin, LedgerOrigin, PaymentMethod, Return, ReturnDetail, ReturnItem,
    SaleStatus,
};

fn default_restock() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReturn {
    pub sale_id: String,
    pub items: Vec<ReturnLineRequest>,
    pub reason: String,
    #[serde(default = "default_restock")]
    pub restock: bool,
    /// Defaults to the sale's payment method.
    #[serde(default)]
    pub refund_method: Option<PaymentMethod>,
    #[serde(default)]
    pub shift_id: Option<String>,
}

async fn fetch_return(conn: &mut SqliteConnection, id: &str) -> DbResult<Return> {
    sqlx::query_as::<_, Return>("SELECT * FROM returns WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Return", id))
}

async fn fetch_return_items(conn: &mut SqliteConnection, return_id: &str) -> DbResult<Vec<ReturnItem>> {
    let items = sqlx::query_as::<_, ReturnItem>(
        "SELECT * FROM return_items WHERE return_id = ?1 ORDER BY rowid",
    )
    .bind(return_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Quantity already returned per sale line.
async fn returned_so_far(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT ri.sale_item_id, SUM(ri.quantity)
        FROM return_items ri
        JOIN returns r ON r.id = ri.return_id
        WHERE r.sale_id = ?1
        GROUP BY ri.sale_item_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn register(&self, input: &NewReturn) -> DbResult<ReturnDetail> {
        validate_required_text("reason", input.reason.trim(), 500)?;
        validate_line_count(input.items.len(), false)?;

        let mut tx = begin_write(&self.pool).await?;

        let sale = fetch_sale(&mut tx, &input.sale_id).await?;
        ensure_returnable(&sale)?;

        let sale_items = fetch_sale_items(&mut tx, &sale.id).await?;
        let already = returned_so_far(&mut tx, &sale.id).await?;
        let plan = plan_return(&sale_items, &already, &input.items)?;

        let shift_id = match (&input.shift_id, &sale.shift_id) {
            (Some(given), _) => {
                let shift = fetch_shift(&mut tx, given).await?;
                ensure_open(&shift)?;
                Some(shift.id)
            }
            (None, Some(original)) => {
                let shift = fetch_shift(&mut tx, original).await?;
                shift.is_open().then_some(shift.id)
            }
            (None, None) => None,
        };

        let now = Utc::now();
        let sale_return = Return {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            shift_id,
            reason: input.reason.trim().to_string(),
            restock: input.restock,
            refund_method: input.refund_method.unwrap_or(sale.payment_method),
            refund_cents: plan.refund_cents,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO returns (
                id, sale_id, shift_id, reason, restock, refund_method, refund_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&sale_return.id)
        .bind(&sale_return.sale_id)
        .bind(&sale_return.shift_id)
        .bind(&sale_return.reason)
        .bind(sale_return.restock)
        .bind(sale_return.refund_method)
        .bind(sale_return.refund_cents)
        .bind(sale_return.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let item = ReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: sale_return.id.clone(),
                sale_item_id: line.sale_item_id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                refund_cents: line.refund_cents,
            };

            sqlx::query(
                r#"
                INSERT INTO return_items (
                    id, return_id, sale_item_id, product_id, quantity, refund_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.sale_item_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.refund_cents)
            .execute(&mut *tx)
            .await?;

            if sale_return.restock {
                post_movement(
                    &mut tx,
                    &item.product_id,
                    LedgerOrigin::Return,
                    Some(&sale_return.id),
                    item.quantity,
                    Some(&sale_return.reason),
                    now,
                )
                .await?;
            }

            items.push(item);
        }

        if let (PaymentMethod::Cash, Some(shift_id)) =
            (sale_return.refund_method, &sale_return.shift_id)
        {
            if sale_return.refund_cents > 0 {
                post_cash_movement(
                    &mut tx,
                    shift_id,
                    CashMovementType::Expense,
                    CashOrigin::Return,
                    Some(&sale_return.id),
                    sale_return.refund_cents,
                    &format!("Devolución {}", sale.folio),
                    now,
                )
                .await?;
            }
        }

        if plan.completes_sale {
            sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
                .bind(&sale.id)
                .bind(SaleStatus::Returned)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            folio = %sale.folio,
            return_id = %sale_return.id,
            refund_cents = sale_return.refund_cents,
            restock = sale_return.restock,
            completes_sale = plan.completes_sale,
            "Return registered"
        );
        Ok(ReturnDetail { sale_return, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<ReturnDetail> {
        let mut conn = self.pool.acquire().await?;
        Ok(ReturnDetail {
            sale_return: fetch_return(&mut conn, id).await?,
            items: fetch_return_items(&mut conn, id).await?,
        })
    }

    pub async fn list(&self, sale_id: Option<&str>) -> DbResult<Vec<Return>> {
        let returns = sqlx::query_as::<_, Return>(
            "SELECT * FROM returns WHERE (?1 IS NULL OR sale_id = ?1) ORDER BY created_at DESC, rowid DESC",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }
}
