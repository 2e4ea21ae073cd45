//! # Returns
//!
//! Returnable quantities and refund amounts for partial or full returns of a
//! paid sale.
//!
//! ```text
//!  sale line: 5 × $10.00 @16%          returns so far: 2
//!       │
//!       ├── returnable = 5 − 2 = 3
//!       ├── request 2  → refund = 2 × $10.00 + tax = $23.20
//!       └── request 4  → ReturnExceedsSold { returnable: 3, requested: 4 }
//! ```
//!
//! Refunds are computed on the cumulative returned quantity of a line, so the
//! refunds of a line never add up to more than its `total_cents`. Returning
//! the last unit refunds exactly what is left of the line total.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::sale::{line_amounts, LineAmounts};
use crate::types::{Sale, SaleItem, SaleStatus, TaxRate};
use crate::validation::{validate_quantity, ValidationResult};

/// A requested return line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineRequest {
    pub sale_item_id: String,
    pub quantity: i64,
}

/// Only paid sales accept returns; partially returned sales stay paid.
pub fn ensure_returnable(sale: &Sale) -> CoreResult<()> {
    if sale.status != SaleStatus::Paid {
        return Err(CoreError::invalid_status(
            "Sale",
            sale.folio.as_str(),
            sale.status,
            "register a return",
        ));
    }
    Ok(())
}

/// Refund for `quantity` more units of a sale line after `returned` units
/// were already refunded.
///
/// The refund is the difference between the cumulative amounts, using the
/// same rounding the sale used. When the line becomes fully returned it is
/// whatever remains of `total_cents`.
pub fn line_refund(item: &SaleItem, returned: i64, quantity: i64) -> ValidationResult<i64> {
    let before = cumulative_total(item, returned)?;
    let after = if returned + quantity >= item.quantity {
        item.total_cents
    } else {
        cumulative_total(item, returned + quantity)?
    };
    Ok((after - before).max(0))
}

fn cumulative_total(item: &SaleItem, quantity: i64) -> ValidationResult<i64> {
    if quantity == 0 {
        return Ok(0);
    }
    let rate = TaxRate::from_bps(item.tax_rate_bps.clamp(0, 10_000) as u32);
    let amounts = line_amounts(Money::from_cents(item.unit_price_cents), quantity, rate)?;
    Ok(amounts.total_cents.min(item.total_cents))
}

/// A validated return line with its refund.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedReturnLine {
    pub sale_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub refund_cents: i64,
}

/// The outcome of validating a whole return request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPlan {
    pub lines: Vec<PlannedReturnLine>,
    pub refund_cents: i64,
    /// True when, after this return, every line of the sale is fully returned.
    pub completes_sale: bool,
}

/// Validates a return against the sale lines and what was already returned.
///
/// `already_returned` maps `sale_item_id` to the quantity returned by earlier
/// returns of the same sale. Lines repeating the same sale item are summed.
pub fn plan_return(
    items: &[SaleItem],
    already_returned: &HashMap<String, i64>,
    requested: &[ReturnLineRequest],
) -> CoreResult<ReturnPlan> {
    if requested.is_empty() {
        return Err(crate::error::ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }

    let mut this_return: HashMap<&str, i64> = HashMap::new();
    let mut lines = Vec::with_capacity(requested.len());

    for req in requested {
        validate_quantity(req.quantity)?;

        let item = items
            .iter()
            .find(|i| i.id == req.sale_item_id)
            .ok_or_else(|| CoreError::not_found("SaleItem", req.sale_item_id.as_str()))?;

        let previous = already_returned.get(&item.id).copied().unwrap_or(0);
        let pending = this_return.entry(item.id.as_str()).or_insert(0);
        let returnable = item.quantity - previous - *pending;

        if req.quantity > returnable {
            return Err(CoreError::ReturnExceedsSold {
                sku: item.sku.clone(),
                returnable,
                requested: req.quantity,
            });
        }
        let refund_cents = line_refund(item, previous + *pending, req.quantity)?;
        *pending += req.quantity;

        lines.push(PlannedReturnLine {
            sale_item_id: item.id.clone(),
            product_id: item.product_id.clone(),
            quantity: req.quantity,
            refund_cents,
        });
    }

    let completes_sale = items.iter().all(|item| {
        let total = already_returned.get(&item.id).copied().unwrap_or(0)
            + this_return.get(item.id.as_str()).copied().unwrap_or(0);
        total >= item.quantity
    });

    let refund_cents = lines
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.refund_cents))
        .ok_or_else(|| ValidationError::AmountOverflow {
            field: "refundCents".to_string(),
        })?;

    Ok(ReturnPlan {
        refund_cents,
        lines,
        completes_sale,
    })
}
