//! # Pricing
//!
//! Time-versioned price lists.
//!
//! ## Activation Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set_price(COKE-600, normal, $18.50)                                   │
//! │                                                                         │
//! │  before:  [normal  $17.00  active  valid_to: -     ]                   │
//! │           [whlsale $15.00  active  valid_to: -     ]                   │
//! │                                                                         │
//! │  after:   [normal  $17.00  closed  valid_to: now   ]  ← closed         │
//! │           [normal  $18.50  active  valid_from: now ]  ← inserted       │
//! │           [whlsale $15.00  active  valid_to: -     ]  ← untouched      │
//! │                                                                         │
//! │  Both writes happen in one transaction; a partial unique index on      │
//! │  (product_id, price_type) WHERE is_active = 1 backs the rule.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::types::{PriceType, ProductPrice};
use crate::validation::validate_price_cents;

/// What the database layer has to write to activate a new price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceActivation {
    /// Id of the currently active row of the same type, to be closed at `now`.
    pub close_id: Option<String>,
    /// The new active row.
    pub new_price: ProductPrice,
}

/// Plans the activation of a new price.
///
/// `current` must be the active row of the same product and type, if any.
pub fn activate_price(
    current: Option<&ProductPrice>,
    product_id: &str,
    price_type: PriceType,
    price_cents: i64,
    new_id: String,
    now: DateTime<Utc>,
) -> CoreResult<PriceActivation> {
    validate_price_cents(price_cents)?;

    let close_id = current
        .filter(|p| p.is_active && p.price_type == price_type && p.product_id == product_id)
        .map(|p| p.id.clone());

    Ok(PriceActivation {
        close_id,
        new_price: ProductPrice {
            id: new_id,
            product_id: product_id.to_string(),
            price_type,
            price_cents,
            valid_from: now,
            valid_to: None,
            is_active: true,
        },
    })
}

/// Picks the active price of a type from a product's price rows.
pub fn active_price(prices: &[ProductPrice], price_type: PriceType) -> Option<&ProductPrice> {
    prices
        .iter()
        .find(|p| p.is_active && p.price_type == price_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn price(id: &str, price_type: PriceType, cents: i64, active: bool) -> ProductPrice {
        ProductPrice {
            id: id.to_string(),
            product_id: "p1".to_string(),
            price_type,
            price_cents: cents,
            valid_from: Utc::now() - Duration::days(3),
            valid_to: None,
            is_active: active,
        }
    }

    #[test]
    fn test_activation_closes_current_of_same_type() {
        let current = price("old", PriceType::Normal, 1700, true);
        let now = Utc::now();
        let plan =
            activate_price(Some(&current), "p1", PriceType::Normal, 1850, "new".into(), now).unwrap();

        assert_eq!(plan.close_id.as_deref(), Some("old"));
        assert_eq!(plan.new_price.price_cents, 1850);
        assert_eq!(plan.new_price.valid_from, now);
        assert!(plan.new_price.is_active);
    }

    #[test]
    fn test_first_price_closes_nothing() {
        let plan =
            activate_price(None, "p1", PriceType::Wholesale, 0, "new".into(), Utc::now()).unwrap();
        assert!(plan.close_id.is_none());
    }

    #[test]
    fn test_activation_ignores_rows_of_other_type() {
        let other = price("w", PriceType::Wholesale, 1500, true);
        let plan =
            activate_price(Some(&other), "p1", PriceType::Normal, 1850, "n".into(), Utc::now())
                .unwrap();
        assert!(plan.close_id.is_none());
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(activate_price(None, "p1", PriceType::Normal, -1, "n".into(), Utc::now()).is_err());
    }

    #[test]
    fn test_active_price_lookup() {
        let rows = vec![
            price("a", PriceType::Normal, 1700, false),
            price("b", PriceType::Normal, 1850, true),
            price("c", PriceType::Special, 1200, true),
        ];
        assert_eq!(active_price(&rows, PriceType::Normal).unwrap().id, "b");
        assert!(active_price(&rows, PriceType::Discount).is_none());
    }
}
