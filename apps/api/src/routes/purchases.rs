//! Purchases: drafts are edited line by line; confirming posts stock entries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::{Purchase, PurchaseDetail};
use mostrador_db::repository::purchase::{NewPurchase, PurchaseFilter, PurchaseLineInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchases", get(list_purchases).post(create_purchase))
        .route("/purchases/{id}", get(get_purchase))
        .route("/purchases/{id}/items", post(add_item))
        .route("/purchases/{id}/items/{item_id}", delete(remove_item))
        .route("/purchases/{id}/confirm", post(confirm_purchase))
        .route("/purchases/{id}/cancel", post(cancel_purchase))
}

async fn list_purchases(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PurchaseFilter>,
) -> ApiResult<Json<Vec<Purchase>>> {
    Ok(Json(state.db.purchases().list(&filter).await?))
}

async fn create_purchase(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewPurchase>,
) -> ApiResult<(StatusCode, Json<PurchaseDetail>)> {
    let detail = state.db.purchases().create(&body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseDetail>> {
    Ok(Json(state.db.purchases().get(&id).await?))
}

async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PurchaseLineInput>,
) -> ApiResult<Json<PurchaseDetail>> {
    Ok(Json(state.db.purchases().add_item(&id, &body).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<PurchaseDetail>> {
    Ok(Json(state.db.purchases().remove_item(&id, &item_id).await?))
}

async fn confirm_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseDetail>> {
    Ok(Json(state.db.purchases().confirm(&id).await?))
}

async fn cancel_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Purchase>> {
    Ok(Json(state.db.purchases().cancel(&id).await?))
}
