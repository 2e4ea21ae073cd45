//! Stock levels and manual adjustments.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::inventory::StockLevel;
use mostrador_core::InventoryMovement;
use mostrador_db::repository::inventory::AdjustmentInput;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(stock_levels))
        .route("/inventory/adjustments", post(adjust))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsQuery {
    /// Only products at or below their minimum.
    #[serde(default)]
    pub low_only: bool,
}

async fn stock_levels(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LevelsQuery>,
) -> ApiResult<Json<Vec<StockLevel>>> {
    Ok(Json(state.db.inventory().stock_levels(query.low_only).await?))
}

async fn adjust(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AdjustmentInput>,
) -> ApiResult<(StatusCode, Json<InventoryMovement>)> {
    let movement = state.db.inventory().adjust(&body).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}
