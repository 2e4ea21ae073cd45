//! # Route Handlers
//!
//! One module per resource; every module exposes `router()` with paths
//! relative to `/api`.
//!
//! ```text
//! /api/health                     health
//! /api/auth/login, /me            auth
//! /api/users, /api/employees      users, employees
//! /api/clients, /api/suppliers    clients, suppliers
//! /api/products/...               products (prices, stock, kardex)
//! /api/inventory/...              inventory (levels, adjustments)
//! /api/purchases/...              purchases
//! /api/sales/...                  sales
//! /api/cash/shifts/...            cash
//! /api/returns                    returns
//! /api/orders/...                 orders
//! /api/dashboard/...              dashboard
//! ```

pub mod auth;
pub mod cash;
pub mod clients;
pub mod dashboard;
pub mod employees;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod purchases;
pub mod returns;
pub mod sales;
pub mod suppliers;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Every `/api` route.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(employees::router())
        .merge(clients::router())
        .merge(suppliers::router())
        .merge(products::router())
        .merge(inventory::router())
        .merge(purchases::router())
        .merge(sales::router())
        .merge(cash::router())
        .merge(returns::router())
        .merge(orders::router())
        .merge(dashboard::router())
}
