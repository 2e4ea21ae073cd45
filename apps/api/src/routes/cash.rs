//! # Cash Register Routes
//!
//! ```text
//! GET/POST /cash/shifts                     list (?status) / open
//! GET      /cash/shifts/{id}
//! GET/POST /cash/shifts/{id}/movements      manual income and expenses
//! GET      /cash/shifts/{id}/cutoff         stored corte of a closed shift
//! GET      /cash/shifts/{id}/cutoff/preview expected cash right now
//! POST     /cash/shifts/{id}/close          { countedCashCents, notes? }
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::shift::Reconciliation;
use mostrador_core::{CashCutoff, CashMovement, CashShift, ShiftStatus};
use mostrador_db::repository::shift::{CloseShift, NewCashMovement, OpenShift};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cash/shifts", get(list_shifts).post(open_shift))
        .route("/cash/shifts/{id}", get(get_shift))
        .route(
            "/cash/shifts/{id}/movements",
            get(list_movements).post(record_movement),
        )
        .route("/cash/shifts/{id}/cutoff", get(get_cutoff))
        .route("/cash/shifts/{id}/cutoff/preview", get(preview_cutoff))
        .route("/cash/shifts/{id}/close", post(close_shift))
}

#[derive(Debug, Default, Deserialize)]
pub struct ShiftQuery {
    pub status: Option<ShiftStatus>,
}

async fn list_shifts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ShiftQuery>,
) -> ApiResult<Json<Vec<CashShift>>> {
    Ok(Json(state.db.shifts().list(query.status).await?))
}

/// 409 when the register already has an open shift.
async fn open_shift(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OpenShift>,
) -> ApiResult<(StatusCode, Json<CashShift>)> {
    let shift = state.db.shifts().open(&body).await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

async fn get_shift(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<CashShift>> {
    Ok(Json(state.db.shifts().get(&id).await?))
}

async fn list_movements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CashMovement>>> {
    Ok(Json(state.db.shifts().list_movements(&id).await?))
}

async fn record_movement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewCashMovement>,
) -> ApiResult<(StatusCode, Json<CashMovement>)> {
    let movement = state.db.shifts().record_movement(&id, &body).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

async fn get_cutoff(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<CashCutoff>> {
    Ok(Json(state.db.shifts().get_cutoff(&id).await?))
}

async fn preview_cutoff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Reconciliation>> {
    Ok(Json(state.db.shifts().preview_cutoff(&id).await?))
}

async fn close_shift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CloseShift>,
) -> ApiResult<Json<CashCutoff>> {
    Ok(Json(state.db.shifts().close(&id, &body).await?))
}
