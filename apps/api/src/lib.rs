//! # mostrador-api
//!
//! REST server for the Mostrador back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         API Server                                      │
//! │                                                                         │
//! │  HTTP ──► TraceLayer ──► CorsLayer ──► /api/* handlers                 │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                                    mostrador-db repositories            │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                                       SQLite (WAL)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ApiConfig`]: TOML file plus `MOSTRADOR_*` environment
//! variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// The complete application: every route under `/api` plus the HTTP layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
