//! Suppliers. Names and tax ids are unique; `DELETE` deactivates.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::Supplier;
use mostrador_db::repository::supplier::{SupplierFilter, SupplierInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/suppliers/{id}",
            get(get_supplier).put(update_supplier).delete(deactivate_supplier),
        )
}

async fn list_suppliers(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SupplierFilter>,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.db.suppliers().list(&filter).await?))
}

async fn create_supplier(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SupplierInput>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.db.suppliers().create(&body).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

async fn get_supplier(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.db.suppliers().get(&id).await?))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SupplierInput>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.db.suppliers().update(&id, &body).await?))
}

async fn deactivate_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.suppliers().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
