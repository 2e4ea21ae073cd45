//! # Product Routes
//!
//! Catalog, time-versioned prices, stock and kardex.
//!
//! ```text
//! GET/POST  /products
//! GET/PUT   /products/{id}
//! DELETE    /products/{id}                 deactivate
//! GET       /products/by-sku/{sku}
//! PUT       /products/{id}/status          { status }
//! GET/POST  /products/{id}/prices          history / new price
//! GET       /products/{id}/prices/current  active price per type
//! GET       /products/{id}/stock           Σ ledger
//! GET       /products/{id}/kardex          ?from&to
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::inventory::Kardex;
use mostrador_core::{PriceType, Product, ProductPrice, ProductStatus};
use mostrador_db::repository::inventory::KardexRange;
use mostrador_db::repository::product::{ProductFilter, ProductInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/by-sku/{sku}", get(get_product_by_sku))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(deactivate_product),
        )
        .route("/products/{id}/status", put(set_status))
        .route("/products/{id}/prices", get(price_history).post(set_price))
        .route("/products/{id}/prices/current", get(current_prices))
        .route("/products/{id}/stock", get(stock))
        .route("/products/{id}/kardex", get(kardex))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrice {
    #[serde(default)]
    pub price_type: PriceType,
    pub price_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuery {
    pub price_type: Option<PriceType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub product_id: String,
    pub stock: i64,
}

async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<Json<Vec<Product>>> {
    debug!(search = ?filter.search, status = ?filter.status, "Listing products");
    Ok(Json(state.db.products().list(&filter).await?))
}

async fn create_product(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.products().create(&body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get(&id).await?))
}

async fn get_product_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get_by_sku(&sku).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().update(&id, &body).await?))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusChange>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().set_status(&id, body.status).await?))
}

/// Products stay in the ledger forever, so delete only deactivates.
async fn deactivate_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db
        .products()
        .set_status(&id, ProductStatus::Inactive)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the active price of that type; the old one stays in history.
async fn set_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewPrice>,
) -> ApiResult<(StatusCode, Json<ProductPrice>)> {
    let price = state
        .db
        .products()
        .set_price(&id, body.price_type, body.price_cents)
        .await?;
    Ok((StatusCode::CREATED, Json(price)))
}

async fn price_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PriceQuery>,
) -> ApiResult<Json<Vec<ProductPrice>>> {
    Ok(Json(state.db.products().price_history(&id, query.price_type).await?))
}

/// All active prices, or only the one of `priceType` (400 when it has none).
async fn current_prices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PriceQuery>,
) -> ApiResult<Json<Vec<ProductPrice>>> {
    let products = state.db.products();
    let prices = match query.price_type {
        Some(price_type) => vec![products.current_price(&id, price_type).await?],
        None => products.current_prices(&id).await?,
    };
    Ok(Json(prices))
}

async fn stock(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<StockResponse>> {
    let stock = state.db.inventory().stock(&id).await?;
    Ok(Json(StockResponse {
        product_id: id,
        stock,
    }))
}

async fn kardex(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(range): ApiQuery<KardexRange>,
) -> ApiResult<Json<Kardex>> {
    Ok(Json(state.db.inventory().kardex(&id, &range).await?))
}
