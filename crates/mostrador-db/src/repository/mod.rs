//! # Repository Module
//!
//! Database repositories and transactional workflows for Mostrador.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                          │
//! │       │  db.sales().register(&new_sale)                                │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │       │  let mut tx = begin_write(pool)  (BEGIN IMMEDIATE)             │
//! │       │  read rows        (&mut *tx)                                   │
//! │       │  decide           (mostrador-core, pure)                       │
//! │       │  write rows       (&mut *tx)                                   │
//! │       │  tx.commit()                                                   │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! │                                                                         │
//! │  Any `?` before commit drops `tx`, which rolls everything back.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Products and time-versioned prices
//! - [`ClientRepository`] / [`SupplierRepository`] - Parties
//! - [`EmployeeRepository`] / [`UserRepository`] - Staff and logins
//! - [`PurchaseRepository`] - Draft purchases and confirmation
//! - [`SaleRepository`] - Sale registration and cancellation
//! - [`ShiftRepository`] - Cash shifts, movements and cut-off
//! - [`ReturnRepository`] - Partial and full returns
//! - [`OrderRepository`] - Orders and their status machine
//! - [`InventoryRepository`] - Stock, adjustments and kardex
//! - [`DashboardRepository`] - Daily aggregates

pub mod client;
pub mod dashboard;
pub mod employee;
pub mod inventory;
pub mod order;
pub mod product;
pub mod purchase;
pub mod returns;
pub mod sale;
pub mod shift;
pub mod supplier;
pub mod user;

mod shared;

#[cfg(test)]
pub(crate) mod fixtures;

pub use client::ClientRepository;
pub use dashboard::DashboardRepository;
pub use employee::EmployeeRepository;
pub use inventory::InventoryRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use purchase::PurchaseRepository;
pub use returns::ReturnRepository;
pub use sale::SaleRepository;
pub use shift::ShiftRepository;
pub use supplier::SupplierRepository;
pub use user::UserRepository;
