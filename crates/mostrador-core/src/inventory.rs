//! # Inventory Ledger
//!
//! Stock is never stored: it is the sum of the append-only movement ledger.
//!
//! ## Kardex
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kardex(COKE-600, from = Oct 10)                                        │
//! │                                                                         │
//! │  opening balance (Σ before Oct 10) ........................... 12      │
//! │                                                                         │
//! │  date     type        origin              qty    balance               │
//! │  Oct 10   exit        sale                 −2         10               │
//! │  Oct 11   entry       purchase            +24         34               │
//! │  Oct 12   adjustment  adjustment           −1         33               │
//! │                                                                         │
//! │  closing balance ............................................. 33      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{InventoryMovement, LedgerOrigin, MovementType};
use crate::validation::validate_adjustment_quantity;

/// Checks that a signed quantity agrees with its movement type.
pub fn check_movement_sign(movement_type: MovementType, quantity: i64) -> CoreResult<()> {
    let ok = match movement_type {
        MovementType::Entry => quantity > 0,
        MovementType::Exit => quantity < 0,
        MovementType::Adjustment => quantity != 0,
    };
    if !ok {
        return Err(ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: format!("sign does not match movement type {movement_type}"),
        }
        .into());
    }
    Ok(())
}

/// The movement type a workflow posts with its signed quantity.
pub fn movement_type_for(origin: LedgerOrigin, quantity: i64) -> MovementType {
    match origin {
        LedgerOrigin::Adjustment => MovementType::Adjustment,
        _ if quantity < 0 => MovementType::Exit,
        _ => MovementType::Entry,
    }
}

/// Validates a manual adjustment against the current stock.
///
/// The result may reach zero but never go below it.
pub fn check_adjustment(sku: &str, current_stock: i64, delta: i64) -> CoreResult<i64> {
    validate_adjustment_quantity(delta)?;
    let result = current_stock + delta;
    if result < 0 {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: current_stock,
            requested: -delta,
        });
    }
    Ok(result)
}

/// Low stock means at or below the product threshold.
#[inline]
pub fn is_low_stock(stock: i64, min_stock: i64) -> bool {
    stock <= min_stock
}

/// Stock of one product, as listed by `stock_levels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub min_stock: i64,
    pub stock: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub low_stock: bool,
}

impl StockLevel {
    /// Recomputes `low_stock` from `stock` and `min_stock`.
    pub fn flagged(mut self) -> Self {
        self.low_stock = is_low_stock(self.stock, self.min_stock);
        self
    }
}

/// One kardex row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct KardexEntry {
    pub movement_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub movement_type: MovementType,
    pub origin: LedgerOrigin,
    pub origin_id: Option<String>,
    pub notes: Option<String>,
    pub quantity: i64,
    /// Stock right after this movement.
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Kardex {
    pub product_id: String,
    pub opening_balance: i64,
    pub entries: Vec<KardexEntry>,
    pub closing_balance: i64,
}

/// Builds a kardex from the opening balance and the chronologically sorted
/// movements of the period.
pub fn build_kardex(
    product_id: &str,
    opening_balance: i64,
    movements: &[InventoryMovement],
) -> Kardex {
    let mut balance = opening_balance;
    let entries = movements
        .iter()
        .map(|m| {
            balance += m.quantity;
            KardexEntry {
                movement_id: m.id.clone(),
                created_at: m.created_at,
                movement_type: m.movement_type,
                origin: m.origin,
                origin_id: m.origin_id.clone(),
                notes: m.notes.clone(),
                quantity: m.quantity,
                balance,
            }
        })
        .collect();

    Kardex {
        product_id: product_id.to_string(),
        opening_balance,
        entries,
        closing_balance: balance,
    }
}
