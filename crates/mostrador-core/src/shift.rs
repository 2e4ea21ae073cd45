//! # Cash-Register Shifts
//!
//! The cut-off (corte) reconciliation of a shift.
//!
//! ## Expected Cash
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  expected_cash = opening_float                                         │
//! │                + cash_sales          (paid + returned sales, cash)     │
//! │                + manual_income       (origin = manual)                 │
//! │                − manual_expense      (origin = manual)                 │
//! │                − cash_refunds        (returns refunded in cash)        │
//! │                                                                         │
//! │  difference    = counted_cash − expected_cash                          │
//! │                  (< 0 short, > 0 over)                                  │
//! │                                                                         │
//! │  Cash movements with origin sale / sale_cancellation / return are the  │
//! │  audit trail of the postings above and are NOT summed a second time.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::ValidationResult;
use crate::types::{
    CashMovement, CashMovementType, CashOrigin, CashShift, PaymentMethod, Return, Sale, SaleStatus,
};

/// Fails with `ShiftClosed` unless the shift is open.
pub fn ensure_open(shift: &CashShift) -> CoreResult<()> {
    if !shift.is_open() {
        return Err(CoreError::ShiftClosed {
            shift_id: shift.id.clone(),
        });
    }
    Ok(())
}

/// Full breakdown of a shift's cash position.
///
/// `counted_cash_cents` and `difference_cents` are `None` in a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub shift_id: String,
    pub opening_float_cents: i64,
    pub cash_sales_cents: i64,
    pub card_sales_cents: i64,
    pub transfer_sales_cents: i64,
    pub manual_income_cents: i64,
    pub manual_expense_cents: i64,
    pub cash_refunds_cents: i64,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: Option<i64>,
    pub difference_cents: Option<i64>,
    /// Sales counted in the totals (cancelled sales excluded).
    pub sale_count: i64,
}

impl Reconciliation {
    /// Completes the reconciliation with the cash counted in the drawer.
    pub fn with_counted(mut self, counted_cash_cents: i64) -> ValidationResult<Self> {
        let difference = counted_cash_cents
            .checked_sub(self.expected_cash_cents)
            .ok_or_else(|| overflow("differenceCents"))?;
        self.counted_cash_cents = Some(counted_cash_cents);
        self.difference_cents = Some(difference);
        Ok(self)
    }
}

fn overflow(field: &str) -> ValidationError {
    ValidationError::AmountOverflow {
        field: field.to_string(),
    }
}

fn add(acc: i64, amount: i64, field: &str) -> ValidationResult<i64> {
    acc.checked_add(amount).ok_or_else(|| overflow(field))
}

/// Computes the reconciliation of a shift from its own sales, returns and
/// cash movements.
///
/// Rows belonging to other shifts are ignored, so callers may pass a wider
/// set without filtering first.
pub fn reconcile(
    shift: &CashShift,
    sales: &[Sale],
    returns: &[Return],
    movements: &[CashMovement],
) -> ValidationResult<Reconciliation> {
    let on_shift = |id: Option<&String>| id.map(String::as_str) == Some(shift.id.as_str());

    let mut cash_sales = 0;
    let mut card_sales = 0;
    let mut transfer_sales = 0;
    let mut sale_count = 0;

    for sale in sales
        .iter()
        .filter(|s| on_shift(s.shift_id.as_ref()))
        .filter(|s| matches!(s.status, SaleStatus::Paid | SaleStatus::Returned))
    {
        sale_count += 1;
        match sale.payment_method {
            PaymentMethod::Cash => cash_sales = add(cash_sales, sale.total_cents, "cashSalesCents")?,
            PaymentMethod::Card => card_sales = add(card_sales, sale.total_cents, "cardSalesCents")?,
            PaymentMethod::Transfer => {
                transfer_sales = add(transfer_sales, sale.total_cents, "transferSalesCents")?
            }
        }
    }

    let cash_refunds = returns
        .iter()
        .filter(|r| on_shift(r.shift_id.as_ref()) && r.refund_method == PaymentMethod::Cash)
        .try_fold(0, |acc, r| add(acc, r.refund_cents, "cashRefundsCents"))?;

    let (manual_income, manual_expense) = movements
        .iter()
        .filter(|m| m.shift_id == shift.id && m.origin == CashOrigin::Manual)
        .try_fold((0, 0), |(inc, exp), m| -> ValidationResult<(i64, i64)> {
            Ok(match m.movement_type {
                CashMovementType::Income => (add(inc, m.amount_cents, "manualIncomeCents")?, exp),
                CashMovementType::Expense => (inc, add(exp, m.amount_cents, "manualExpenseCents")?),
            })
        })?;

    let expected = shift
        .opening_float_cents
        .checked_add(cash_sales)
        .and_then(|v| v.checked_add(manual_income))
        .and_then(|v| v.checked_sub(manual_expense))
        .and_then(|v| v.checked_sub(cash_refunds))
        .ok_or_else(|| overflow("expectedCashCents"))?;

    Ok(Reconciliation {
        shift_id: shift.id.clone(),
        opening_float_cents: shift.opening_float_cents,
        cash_sales_cents: cash_sales,
        card_sales_cents: card_sales,
        transfer_sales_cents: transfer_sales,
        manual_income_cents: manual_income,
        manual_expense_cents: manual_expense,
        cash_refunds_cents: cash_refunds,
        expected_cash_cents: expected,
        counted_cash_cents: None,
        difference_cents: None,
        sale_count,
    })
}
