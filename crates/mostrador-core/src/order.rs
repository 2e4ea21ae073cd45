//! # Orders (Pedidos)
//!
//! Status machine and price freezing for customer orders.
//!
//! ## Transition Table
//! ```text
//!   draft ──────► confirmed ──────► preparing ──────► ready ──────► invoiced ──────► delivered
//!     │               │                 │               │
//!     └───────────────┴─────────────────┴───────────────┴──────► cancelled
//! ```
//!
//! `delivered` and `cancelled` are terminal. Lines may only be edited while
//! the order is a draft; confirming freezes the `normal` price of unpriced
//! lines.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sale::{compute_totals, line_amounts, LineAmounts};
use crate::types::{Order, OrderItem, OrderStatus, TaxRate};
use crate::validation::ValidationResult;

/// Folio prefix for orders.
pub const ORDER_FOLIO_PREFIX: &str = "P";

/// A requested order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Optional negotiated price; frozen as-is at confirmation.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

/// Statuses reachable from `from` in one step.
pub const fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Draft => &[Confirmed, Cancelled],
        Confirmed => &[Preparing, Cancelled],
        Preparing => &[Ready, Cancelled],
        Ready => &[Invoiced, Cancelled],
        Invoiced => &[Delivered],
        Delivered | Cancelled => &[],
    }
}

#[inline]
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Fails with `InvalidTransition` for pairs outside the table.
pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if !can_transition(from, to) {
        return Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Orders still in progress (not delivered and not cancelled).
#[inline]
pub fn is_open(status: OrderStatus) -> bool {
    !matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled)
}

/// Lines and notes can only change while the order is a draft.
pub fn ensure_editable(order: &Order) -> CoreResult<()> {
    if order.status != OrderStatus::Draft {
        return Err(CoreError::invalid_status(
            "Order",
            order.folio.as_str(),
            order.status,
            "edit",
        ));
    }
    Ok(())
}

/// Amounts of an order line. Unpriced lines count as zero.
pub fn order_line_amounts(
    unit_price_cents: Option<i64>,
    quantity: i64,
    tax_rate_bps: i64,
) -> ValidationResult<LineAmounts> {
    match unit_price_cents {
        Some(unit) => line_amounts(
            Money::from_cents(unit),
            quantity,
            TaxRate::from_bps(tax_rate_bps.clamp(0, 10_000) as u32),
        ),
        None => Ok(LineAmounts::default()),
    }
}

/// Freezes prices on confirmation.
///
/// `normal_price` resolves the active `normal` price of a product id. When a
/// product has none it fails with [`CoreError::NoActivePrice`] carrying the
/// product's SKU, which only the caller knows. Lines that already carry a
/// price keep it. Returns the repriced lines and the new order totals.
pub fn freeze_prices<F>(items: &[OrderItem], mut normal_price: F) -> CoreResult<(Vec<OrderItem>, LineAmounts)>
where
    F: FnMut(&str) -> CoreResult<i64>,
{
    if items.is_empty() {
        return Err(CoreError::InvalidOperation(
            "cannot confirm an order without lines".to_string(),
        ));
    }

    let mut frozen = Vec::with_capacity(items.len());
    for item in items {
        let unit = match item.unit_price_cents {
            Some(unit) => unit,
            None => normal_price(&item.product_id)?,
        };
        let amounts = order_line_amounts(Some(unit), item.quantity, item.tax_rate_bps)?;
        frozen.push(OrderItem {
            unit_price_cents: Some(unit),
            subtotal_cents: amounts.subtotal_cents,
            tax_cents: amounts.tax_cents,
            total_cents: amounts.total_cents,
            ..item.clone()
        });
    }

    let totals = order_totals(&frozen)?;
    Ok((frozen, totals))
}

/// Sums the stored line amounts of an order.
pub fn order_totals(items: &[OrderItem]) -> ValidationResult<LineAmounts> {
    let lines: Vec<LineAmounts> = items
        .iter()
        .map(|i| LineAmounts {
            subtotal_cents: i.subtotal_cents,
            tax_cents: i.tax_cents,
            total_cents: i.total_cents,
        })
        .collect();
    compute_totals(&lines)
}
