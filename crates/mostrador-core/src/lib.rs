//! # mostrador-core: Pure Business Logic for Mostrador
//!
//! This crate holds every business rule of the back office as pure
//! functions with zero I/O dependencies. The database layer feeds it data
//! read inside a transaction and writes back whatever it decides.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mostrador Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /api/products, /api/sales, /api/cash/shifts, ...             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    mostrador-db (Database Layer)                │   │
//! │  │        repositories, transactions, migrations                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ mostrador-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │  sale   │ │  shift  │ │  order  │ │inventory│  │   │
//! │  │   │ TaxRate │ │ totals  │ │  corte  │ │ status  │ │ kardex  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and status enums
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//! - [`pricing`] - Price activation rule
//! - [`sale`] - Sale line pricing, stock checks, totals and change
//! - [`returns`] - Returnable quantities and refunds
//! - [`shift`] - Cash-register reconciliation (corte)
//! - [`order`] - Order status machine
//! - [`inventory`] - Ledger sums and the kardex report
//!
//! ## Example Usage
//!
//! ```rust
//! use mostrador_core::money::Money;
//! use mostrador_core::types::TaxRate;
//!
//! let price = Money::from_cents(1000); // $10.00
//! let tax = price.calculate_tax(TaxRate::from_bps(1600)).unwrap(); // 16% IVA
//! assert_eq!(tax.cents(), 160);
//! ```

pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod pricing;
pub mod returns;
pub mod sale;
pub mod shift;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines accepted in a single sale, purchase, return or order.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Largest amount accepted from a client: prices, unit costs, tendered
/// cash, cash movements, floats and counted cash ($100,000,000.00).
///
/// With [`MAX_LINE_QUANTITY`] and [`MAX_DOCUMENT_LINES`] a whole document
/// stays far below `i64::MAX`.
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 9_999;
