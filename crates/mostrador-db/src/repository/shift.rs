//! # Shift Repository
//!
//! Cash-register shifts, manual drawer movements and the cut-off (corte).
//!
//! ## Shift Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open("Caja 1", float $500)        at most one open shift per register │
//! │       │                                                                 │
//! │       ├── sales / cancellations / returns post cash movements          │
//! │       ├── record_movement(income | expense)     manual                 │
//! │       ├── preview_cutoff()                      read-only              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  close(counted $1,234.50)                                              │
//! │       ├── reconcile sales, returns and manual movements                │
//! │       ├── INSERT cash_cutoffs                                          │
//! │       └── status = closed, closed_at = now                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{begin_write, clean, fetch_shift, post_cash_movement};
use mostrador_core::shift::{ensure_open, reconcile, Reconciliation};
use mostrador_core::validation::{
    validate_amount_cents, validate_optional_text, validate_positive_amount,
    validate_required_text,
};
use mostrador_core::{
    CashCutoff, CashMovement, CashMovementType, CashOrigin, CashShift, CoreError, Return, Sale,
    ShiftStatus,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenShift {
    pub register_name: String,
    pub opened_by: String,
    #[serde(default)]
    pub opening_float_cents: i64,
}

/// A manual drawer movement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCashMovement {
    pub movement_type: CashMovementType,
    pub amount_cents: i64,
    pub concept: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseShift {
    pub counted_cash_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Reads everything the reconciliation needs and computes it.
async fn reconcile_shift(conn: &mut SqliteConnection, shift: &CashShift) -> DbResult<Reconciliation> {
    let sales = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE shift_id = ?1")
        .bind(&shift.id)
        .fetch_all(&mut *conn)
        .await?;
    let returns = sqlx::query_as::<_, Return>("SELECT * FROM returns WHERE shift_id = ?1")
        .bind(&shift.id)
        .fetch_all(&mut *conn)
        .await?;
    let movements = sqlx::query_as::<_, CashMovement>(
        "SELECT * FROM cash_movements WHERE shift_id = ?1",
    )
    .bind(&shift.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(reconcile(shift, &sales, &returns, &movements)?)
}

#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Opens a shift. A second open shift on the same register → `Duplicate`.
    pub async fn open(&self, input: &OpenShift) -> DbResult<CashShift> {
        let register_name = input.register_name.trim();
        validate_required_text("registerName", register_name, 50)?;
        validate_required_text("openedBy", input.opened_by.trim(), 100)?;
        validate_amount_cents("openingFloatCents", input.opening_float_cents)?;

        let mut tx = begin_write(&self.pool).await?;

        let already_open: Option<String> = sqlx::query_scalar(
            "SELECT id FROM cash_shifts WHERE register_name = ?1 AND status = ?2",
        )
        .bind(register_name)
        .bind(ShiftStatus::Open)
        .fetch_optional(&mut *tx)
        .await?;
        if already_open.is_some() {
            return Err(CoreError::duplicate("registerName", register_name).into());
        }

        let shift = CashShift {
            id: Uuid::new_v4().to_string(),
            register_name: register_name.to_string(),
            opened_by: input.opened_by.trim().to_string(),
            opening_float_cents: input.opening_float_cents,
            status: ShiftStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_shifts (
                id, register_name, opened_by, opening_float_cents, status, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.register_name)
        .bind(&shift.opened_by)
        .bind(shift.opening_float_cents)
        .bind(shift.status)
        .bind(shift.opened_at)
        .bind(shift.closed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            register = %shift.register_name,
            opening_float_cents = shift.opening_float_cents,
            "Shift opened"
        );
        Ok(shift)
    }

    /// Records a manual income or expense. Closed shifts reject it.
    pub async fn record_movement(
        &self,
        shift_id: &str,
        input: &NewCashMovement,
    ) -> DbResult<CashMovement> {
        validate_positive_amount("amountCents", input.amount_cents)?;
        validate_required_text("concept", input.concept.trim(), 200)?;

        let mut tx = begin_write(&self.pool).await?;

        let shift = fetch_shift(&mut tx, shift_id).await?;
        ensure_open(&shift)?;

        let movement = post_cash_movement(
            &mut tx,
            shift_id,
            input.movement_type,
            CashOrigin::Manual,
            None,
            input.amount_cents,
            input.concept.trim(),
            Utc::now(),
        )
        .await?;

        tx.commit().await?;

        debug!(
            shift_id = %shift_id,
            movement_type = %movement.movement_type,
            amount_cents = movement.amount_cents,
            "Cash movement recorded"
        );
        Ok(movement)
    }

    /// Every drawer movement of the shift, oldest first.
    pub async fn list_movements(&self, shift_id: &str) -> DbResult<Vec<CashMovement>> {
        self.get(shift_id).await?;

        let movements = sqlx::query_as::<_, CashMovement>(
            "SELECT * FROM cash_movements WHERE shift_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// The reconciliation as it stands now, without closing anything.
    pub async fn preview_cutoff(&self, shift_id: &str) -> DbResult<Reconciliation> {
        let mut conn = self.pool.acquire().await?;
        let shift = fetch_shift(&mut conn, shift_id).await?;
        reconcile_shift(&mut conn, &shift).await
    }

    /// Closes the shift and persists its cut-off.
    ///
    /// ## Transaction
    /// 1. Shift must be open
    /// 2. Reconcile sales, returns and manual movements
    /// 3. INSERT `cash_cutoffs` with counted cash and difference
    /// 4. Status → `closed`, `closed_at = now`
    pub async fn close(&self, shift_id: &str, input: &CloseShift) -> DbResult<CashCutoff> {
        validate_amount_cents("countedCashCents", input.counted_cash_cents)?;
        validate_optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut tx = begin_write(&self.pool).await?;

        let shift = fetch_shift(&mut tx, shift_id).await?;
        ensure_open(&shift)?;

        let rec = reconcile_shift(&mut tx, &shift)
            .await?
            .with_counted(input.counted_cash_cents)?;

        let now = Utc::now();
        let cutoff = CashCutoff {
            id: Uuid::new_v4().to_string(),
            shift_id: shift.id.clone(),
            opening_float_cents: rec.opening_float_cents,
            cash_sales_cents: rec.cash_sales_cents,
            card_sales_cents: rec.card_sales_cents,
            transfer_sales_cents: rec.transfer_sales_cents,
            manual_income_cents: rec.manual_income_cents,
            manual_expense_cents: rec.manual_expense_cents,
            cash_refunds_cents: rec.cash_refunds_cents,
            expected_cash_cents: rec.expected_cash_cents,
            counted_cash_cents: input.counted_cash_cents,
            difference_cents: rec.difference_cents.unwrap_or_default(),
            sale_count: rec.sale_count,
            notes: clean(input.notes.as_deref()),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_cutoffs (
                id, shift_id, opening_float_cents, cash_sales_cents, card_sales_cents,
                transfer_sales_cents, manual_income_cents, manual_expense_cents,
                cash_refunds_cents, expected_cash_cents, counted_cash_cents,
                difference_cents, sale_count, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&cutoff.id)
        .bind(&cutoff.shift_id)
        .bind(cutoff.opening_float_cents)
        .bind(cutoff.cash_sales_cents)
        .bind(cutoff.card_sales_cents)
        .bind(cutoff.transfer_sales_cents)
        .bind(cutoff.manual_income_cents)
        .bind(cutoff.manual_expense_cents)
        .bind(cutoff.cash_refunds_cents)
        .bind(cutoff.expected_cash_cents)
        .bind(cutoff.counted_cash_cents)
        .bind(cutoff.difference_cents)
        .bind(cutoff.sale_count)
        .bind(&cutoff.notes)
        .bind(cutoff.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE cash_shifts SET status = ?2, closed_at = ?3 WHERE id = ?1")
            .bind(shift_id)
            .bind(ShiftStatus::Closed)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            shift_id = %shift_id,
            register = %shift.register_name,
            expected_cents = cutoff.expected_cash_cents,
            counted_cents = cutoff.counted_cash_cents,
            difference_cents = cutoff.difference_cents,
            "Shift closed"
        );
        Ok(cutoff)
    }

    pub async fn get(&self, id: &str) -> DbResult<CashShift> {
        let mut conn = self.pool.acquire().await?;
        fetch_shift(&mut conn, id).await
    }

    /// Shifts newest first.
    pub async fn list(&self, status: Option<ShiftStatus>) -> DbResult<Vec<CashShift>> {
        let shifts = sqlx::query_as::<_, CashShift>(
            "SELECT * FROM cash_shifts WHERE (?1 IS NULL OR status = ?1) ORDER BY opened_at DESC, rowid DESC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(shifts)
    }

    /// The persisted cut-off of a closed shift.
    pub async fn get_cutoff(&self, shift_id: &str) -> DbResult<CashCutoff> {
        self.get(shift_id).await?;

        sqlx::query_as::<_, CashCutoff>("SELECT * FROM cash_cutoffs WHERE shift_id = ?1")
            .bind(shift_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("CashCutoff", shift_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::repository::sale::NewSale;
    use mostrador_core::sale::SaleLineRequest;
    use mostrador_core::PaymentMethod;

    fn sale(product_id: &str, qty: i64, method: PaymentMethod, shift_id: &str) -> NewSale {
        NewSale {
            items: vec![SaleLineRequest {
                product_id: product_id.into(),
                quantity: qty,
                price_type: None,
            }],
            payment_method: method,
            tendered_cents: None,
            client_id: None,
            shift_id: Some(shift_id.into()),
            notes: None,
        }
    }

    fn manual(movement_type: CashMovementType, amount_cents: i64) -> NewCashMovement {
        NewCashMovement {
            movement_type,
            amount_cents,
            concept: "cambio".into(),
        }
    }

    #[tokio::test]
    async fn test_one_open_shift_per_register() {
        let db = fixtures::db().await;
        let first = fixtures::open_shift(&db, "Caja 1", 10_000).await;

        let err = db
            .shifts()
            .open(&OpenShift {
                register_name: "Caja 1".into(),
                opened_by: "luis".into(),
                opening_float_cents: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Duplicate { .. })));

        // Another register is independent
        fixtures::open_shift(&db, "Caja 2", 0).await;

        // After closing, the register can open again
        db.shifts()
            .close(&first.id, &CloseShift { counted_cash_cents: 10_000, notes: None })
            .await
            .unwrap();
        fixtures::open_shift(&db, "Caja 1", 0).await;

        assert_eq!(db.shifts().list(Some(ShiftStatus::Open)).await.unwrap().len(), 2);
        assert_eq!(db.shifts().list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_closed_shift_rejects_movements() {
        let db = fixtures::db().await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;
        db.shifts()
            .close(&shift.id, &CloseShift { counted_cash_cents: 0, notes: None })
            .await
            .unwrap();

        let err = db
            .shifts()
            .record_movement(&shift.id, &manual(CashMovementType::Income, 500))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftClosed { .. })));

        let err = db
            .shifts()
            .close(&shift.id, &CloseShift { counted_cash_cents: 0, notes: None })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftClosed { .. })));
    }

    #[tokio::test]
    async fn test_movement_amount_must_be_positive() {
        let db = fixtures::db().await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;
        let err = db
            .shifts()
            .record_movement(&shift.id, &manual(CashMovementType::Expense, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cutoff_reconciliation() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 20).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 50_000).await;
        let shifts = db.shifts();

        // Cash 2 × $11.60, card 1 × $11.60, one cancelled cash sale
        db.sales().register(&sale(&coke.id, 2, PaymentMethod::Cash, &shift.id)).await.unwrap();
        db.sales().register(&sale(&coke.id, 1, PaymentMethod::Card, &shift.id)).await.unwrap();
        let cancelled = db
            .sales()
            .register(&sale(&coke.id, 3, PaymentMethod::Cash, &shift.id))
            .await
            .unwrap();
        db.sales().cancel(&cancelled.sale.id, None).await.unwrap();

        shifts.record_movement(&shift.id, &manual(CashMovementType::Income, 2_000)).await.unwrap();
        shifts.record_movement(&shift.id, &manual(CashMovementType::Expense, 500)).await.unwrap();

        let preview = shifts.preview_cutoff(&shift.id).await.unwrap();
        assert_eq!(preview.cash_sales_cents, 2_320);
        assert_eq!(preview.card_sales_cents, 1_160);
        assert_eq!(preview.manual_income_cents, 2_000);
        assert_eq!(preview.manual_expense_cents, 500);
        assert_eq!(preview.sale_count, 2);
        assert_eq!(preview.expected_cash_cents, 50_000 + 2_320 + 2_000 - 500);
        assert_eq!(preview.counted_cash_cents, None);

        // Preview does not close
        assert!(shifts.get(&shift.id).await.unwrap().is_open());

        let cutoff = shifts
            .close(
                &shift.id,
                &CloseShift {
                    counted_cash_cents: 53_700,
                    notes: Some("faltan $1.20".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cutoff.expected_cash_cents, 53_820);
        assert_eq!(cutoff.difference_cents, -120);

        let closed = shifts.get(&shift.id).await.unwrap();
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert!(closed.closed_at.is_some());
        let stored = shifts.get_cutoff(&shift.id).await.unwrap();
        assert_eq!(stored.id, cutoff.id);
        assert_eq!(stored.difference_cents, -120);
        assert_eq!(stored.notes.as_deref(), Some("faltan $1.20"));
    }

    #[tokio::test]
    async fn test_cutoff_missing_for_open_shift() {
        let db = fixtures::db().await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;
        assert!(matches!(
            db.shifts().get_cutoff(&shift.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
