//! # Order Routes
//!
//! Lines and notes are editable while the order is a draft. Status changes
//! follow the transition table; confirming freezes line prices.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::order::OrderLineRequest;
use mostrador_core::{Order, OrderDetail, OrderStatus};
use mostrador_db::repository::order::{NewOrder, OrderFilter};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order).patch(update_notes))
        .route("/orders/{id}/items", post(add_item))
        .route("/orders/{id}/items/{item_id}", delete(remove_item))
        .route("/orders/{id}/status", post(change_status))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct NotesUpdate {
    #[serde(default)]
    pub notes: Option<String>,
}

async fn list_orders(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list(&filter).await?))
}

async fn create_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewOrder>,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    let detail = state.db.orders().create(&body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(state.db.orders().get(&id).await?))
}

async fn update_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NotesUpdate>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(
        state.db.orders().update_notes(&id, body.notes.as_deref()).await?,
    ))
}

async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OrderLineRequest>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(state.db.orders().add_item(&id, &body).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(state.db.orders().remove_item(&id, &item_id).await?))
}

async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusChange>,
) -> ApiResult<Json<OrderDetail>> {
    debug!(order_id = %id, to = %body.status, "Changing order status");
    Ok(Json(state.db.orders().change_status(&id, body.status).await?))
}
