//! # Sale Math
//!
//! Everything `register_sale` decides before it writes: line pricing, the
//! aggregated stock check, totals, change and the folio.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines[{product, qty, price_type?}]                                     │
//! │       │                                                                 │
//! │       ├── aggregate_quantities()   same product on two lines → summed   │
//! │       ├── check_stock()            Σ ledger ≥ requested                 │
//! │       ├── price_line()             active product + active price        │
//! │       ├── compute_totals()         Σ subtotal, Σ tax, Σ total           │
//! │       └── settle_payment()         cash: tendered ≥ total               │
//! │                                                                         │
//! │  Any error here aborts the transaction before the first INSERT.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, PriceType, Product, ProductPrice, TaxRate};
use crate::validation::{validate_amount_cents, validate_quantity, ValidationResult};

/// Folio prefix for sales.
pub const SALE_FOLIO_PREFIX: &str = "V";

// =============================================================================
// Requests
// =============================================================================

/// A requested sale line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Defaults to `normal`.
    #[serde(default)]
    pub price_type: Option<PriceType>,
}

impl SaleLineRequest {
    pub fn price_type(&self) -> PriceType {
        self.price_type.unwrap_or_default()
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// Subtotal, tax and total of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// `subtotal = unit × qty`, `tax = round_half_up(subtotal × bps / 10000)`.
///
/// ```rust
/// use mostrador_core::money::Money;
/// use mostrador_core::sale::line_amounts;
/// use mostrador_core::types::TaxRate;
///
/// let amounts = line_amounts(Money::from_cents(1850), 2, TaxRate::from_bps(1600)).unwrap();
/// assert_eq!(amounts.subtotal_cents, 3700);
/// assert_eq!(amounts.tax_cents, 592);
/// assert_eq!(amounts.total_cents, 4292);
/// ```
pub fn line_amounts(unit_price: Money, quantity: i64, rate: TaxRate) -> ValidationResult<LineAmounts> {
    let subtotal = unit_price
        .checked_mul_quantity(quantity)
        .ok_or_else(|| overflow("subtotal"))?;
    let tax = subtotal.calculate_tax(rate).ok_or_else(|| overflow("tax"))?;
    let total = subtotal.checked_add(tax).ok_or_else(|| overflow("total"))?;
    Ok(LineAmounts {
        subtotal_cents: subtotal.cents(),
        tax_cents: tax.cents(),
        total_cents: total.cents(),
    })
}

fn overflow(field: &str) -> ValidationError {
    ValidationError::AmountOverflow {
        field: field.to_string(),
    }
}

/// A sale line after pricing, ready to persist as a `SaleItem`.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub price_type: PriceType,
    pub unit_price_cents: i64,
    pub tax_rate_bps: i64,
    pub quantity: i64,
    pub amounts: LineAmounts,
}

/// Prices one line against the product and its active price of the
/// requested type.
pub fn price_line(
    product: &Product,
    price: Option<&ProductPrice>,
    price_type: PriceType,
    quantity: i64,
) -> CoreResult<PricedLine> {
    validate_quantity(quantity)?;

    if !product.is_active() {
        return Err(CoreError::ProductInactive {
            sku: product.sku.clone(),
        });
    }

    let price = price
        .filter(|p| p.is_active && p.price_type == price_type)
        .ok_or_else(|| CoreError::NoActivePrice {
            sku: product.sku.clone(),
            price_type: price_type.to_string(),
        })?;

    let rate = product.tax_rate();
    Ok(PricedLine {
        product_id: product.id.clone(),
        sku: product.sku.clone(),
        name: product.name.clone(),
        price_type,
        unit_price_cents: price.price_cents,
        tax_rate_bps: rate.bps() as i64,
        quantity,
        amounts: line_amounts(price.price(), quantity, rate)?,
    })
}

// =============================================================================
// Stock
// =============================================================================

/// Sums requested quantities per product, keeping first-appearance order.
pub fn aggregate_quantities(lines: &[SaleLineRequest]) -> Vec<(String, i64)> {
    let mut order: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        match index.get(line.product_id.as_str()) {
            Some(&i) => order[i].1 += line.quantity,
            None => {
                index.insert(line.product_id.as_str(), order.len());
                order.push((line.product_id.clone(), line.quantity));
            }
        }
    }

    order
}

/// Fails with `InsufficientStock` when `available < requested`.
pub fn check_stock(sku: &str, available: i64, requested: i64) -> CoreResult<()> {
    if available < requested {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Totals & Payment
// =============================================================================

/// Sums line amounts into document totals.
pub fn compute_totals<'a>(
    lines: impl IntoIterator<Item = &'a LineAmounts>,
) -> ValidationResult<LineAmounts> {
    lines.into_iter().try_fold(LineAmounts::default(), |acc, l| {
        Ok(LineAmounts {
            subtotal_cents: checked_sum(acc.subtotal_cents, l.subtotal_cents, "subtotal")?,
            tax_cents: checked_sum(acc.tax_cents, l.tax_cents, "tax")?,
            total_cents: checked_sum(acc.total_cents, l.total_cents, "total")?,
        })
    })
}

fn checked_sum(a: i64, b: i64, field: &str) -> ValidationResult<i64> {
    a.checked_add(b).ok_or_else(|| overflow(field))
}

/// Tendered amount and change of a settled sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub tendered_cents: i64,
    pub change_cents: i64,
}

/// Settles a sale total.
///
/// ## Rules
/// - Cash: `tendered` defaults to the total, must cover it, change is the rest
/// - Card / transfer: `tendered = total`, `change = 0`
pub fn settle_payment(
    method: PaymentMethod,
    total_cents: i64,
    tendered_cents: Option<i64>,
) -> CoreResult<Settlement> {
    match method {
        PaymentMethod::Cash => {
            if let Some(tendered) = tendered_cents {
                validate_amount_cents("tenderedCents", tendered)?;
            }
            let tendered = tendered_cents.unwrap_or(total_cents);
            let change = Money::from_cents(tendered)
                .checked_sub_non_negative(Money::from_cents(total_cents))
                .ok_or(CoreError::InsufficientPayment {
                    total_cents,
                    tendered_cents: tendered,
                })?;
            Ok(Settlement {
                tendered_cents: tendered,
                change_cents: change.cents(),
            })
        }
        PaymentMethod::Card | PaymentMethod::Transfer => Ok(Settlement {
            tendered_cents: total_cents,
            change_cents: 0,
        }),
    }
}

// =============================================================================
// Folios
// =============================================================================

/// The per-day folio prefix, e.g. `V-20261016-`.
pub fn folio_day_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}-", prefix, date.format("%Y%m%d"))
}

/// Builds `PREFIX-YYYYMMDD-NNNN`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use mostrador_core::sale::format_folio;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
/// assert_eq!(format_folio("V", date, 7), "V-20261016-0007");
/// ```
pub fn format_folio(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}{:04}", folio_day_prefix(prefix, date), sequence)
}

/// Sequence that follows the highest folio issued today (1 if none).
pub fn next_folio_sequence(last_folio: Option<&str>) -> i64 {
    last_folio
        .and_then(|f| f.rsplit('-').next())
        .and_then(|n| n.parse::<i64>().ok())
        .map_or(1, |n| n + 1)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductStatus;
    use chrono::Utc;

    fn product(status: ProductStatus) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".into(),
            sku: "COKE-600".into(),
            name: "Coca-Cola 600ml".into(),
            description: None,
            unit: "pza".into(),
            tax_rate_bps: 1600,
            min_stock: 0,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn normal_price(cents: i64) -> ProductPrice {
        ProductPrice {
            id: "pr1".into(),
            product_id: "p1".into(),
            price_type: PriceType::Normal,
            price_cents: cents,
            valid_from: Utc::now(),
            valid_to: None,
            is_active: true,
        }
    }

    fn line(product_id: &str, quantity: i64) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
            price_type: None,
        }
    }

    #[test]
    fn test_price_line_snapshots_product() {
        let p = product(ProductStatus::Active);
        let priced = price_line(&p, Some(&normal_price(1850)), PriceType::Normal, 3).unwrap();

        assert_eq!(priced.sku, "COKE-600");
        assert_eq!(priced.unit_price_cents, 1850);
        assert_eq!(priced.amounts.subtotal_cents, 5550);
        assert_eq!(priced.amounts.tax_cents, 888);
        assert_eq!(priced.amounts.total_cents, 6438);
    }

    #[test]
    fn test_price_line_rejects_inactive_product() {
        let p = product(ProductStatus::Inactive);
        let err = price_line(&p, Some(&normal_price(1850)), PriceType::Normal, 1).unwrap_err();
        assert!(matches!(err, CoreError::ProductInactive { .. }));
    }

    #[test]
    fn test_price_line_requires_price_of_requested_type() {
        let p = product(ProductStatus::Active);
        let err = price_line(&p, Some(&normal_price(1850)), PriceType::Wholesale, 1).unwrap_err();
        assert!(matches!(err, CoreError::NoActivePrice { .. }));

        let err = price_line(&p, None, PriceType::Normal, 1).unwrap_err();
        assert!(matches!(err, CoreError::NoActivePrice { .. }));
    }

    #[test]
    fn test_aggregate_quantities_across_lines() {
        let lines = vec![line("a", 1), line("b", 2), line("a", 4)];
        assert_eq!(
            aggregate_quantities(&lines),
            vec![("a".to_string(), 5), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_check_stock() {
        assert!(check_stock("COKE-600", 2, 2).is_ok());
        let err = check_stock("COKE-600", 1, 2).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                sku: "COKE-600".into(),
                available: 1,
                requested: 2
            }
        );
    }

    #[test]
    fn test_totals_are_sums_of_lines() {
        let a = line_amounts(Money::from_cents(1003), 1, TaxRate::from_bps(1600)).unwrap();
        let b = line_amounts(Money::from_cents(2500), 2, TaxRate::zero()).unwrap();
        let totals = compute_totals([&a, &b]).unwrap();
        assert_eq!(totals.subtotal_cents, 6003);
        assert_eq!(totals.tax_cents, 160);
        assert_eq!(totals.total_cents, 6163);
    }

    #[test]
    fn test_settle_cash() {
        let s = settle_payment(PaymentMethod::Cash, 4292, Some(5000)).unwrap();
        assert_eq!(s.change_cents, 708);

        let s = settle_payment(PaymentMethod::Cash, 4292, None).unwrap();
        assert_eq!(s.tendered_cents, 4292);
        assert_eq!(s.change_cents, 0);

        let err = settle_payment(PaymentMethod::Cash, 4292, Some(4000)).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientPayment { .. }));
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let err = line_amounts(Money::from_cents(i64::MAX / 2), 3, TaxRate::from_bps(1600))
            .unwrap_err();
        assert!(matches!(err, ValidationError::AmountOverflow { .. }));

        let big = LineAmounts {
            subtotal_cents: i64::MAX - 1,
            tax_cents: 0,
            total_cents: i64::MAX - 1,
        };
        assert!(compute_totals([&big, &big]).is_err());

        let p = product(ProductStatus::Active);
        let price = normal_price(i64::MAX / 2);
        let err = price_line(&p, Some(&price), PriceType::Normal, 3).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::AmountOverflow { .. })));
    }

    #[test]
    fn test_settle_rejects_absurd_tender() {
        let err = settle_payment(PaymentMethod::Cash, 4292, Some(i64::MAX)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_settle_non_cash_ignores_tendered() {
        let s = settle_payment(PaymentMethod::Card, 4292, Some(10_000)).unwrap();
        assert_eq!(
            s,
            Settlement {
                tendered_cents: 4292,
                change_cents: 0
            }
        );
    }

    #[test]
    fn test_folio_sequence() {
        assert_eq!(next_folio_sequence(None), 1);
        assert_eq!(next_folio_sequence(Some("V-20261016-0041")), 42);
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert_eq!(folio_day_prefix("P", date), "P-20260102-");
    }
}
