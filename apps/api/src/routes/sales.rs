//! # Sale Routes
//!
//! ```text
//! POST /sales               register (stock, pricing, payment, folio)
//! GET  /sales               ?from&to&status&shiftId&limit&offset
//! GET  /sales/{id}
//! GET  /sales/by-folio/{folio}
//! POST /sales/{id}/cancel   { reason? }
//! ```

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::{Sale, SaleDetail};
use mostrador_db::repository::sale::{NewSale, SaleFilter};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sales).post(register_sale))
        .route("/sales/by-folio/{folio}", get(get_sale_by_folio))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/cancel", post(cancel_sale))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn register_sale(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewSale>,
) -> ApiResult<(StatusCode, Json<SaleDetail>)> {
    debug!(
        lines = body.items.len(),
        method = %body.payment_method,
        shift_id = ?body.shift_id,
        "Registering sale"
    );
    let detail = state.db.sales().register(&body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_sales(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SaleFilter>,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().list(&filter).await?))
}

async fn get_sale(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().get(&id).await?))
}

async fn get_sale_by_folio(
    State(state): State<AppState>,
    Path(folio): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().get_by_folio(&folio).await?))
}

/// The body is optional; an empty request cancels without a reason.
async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Sale>> {
    let request: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::validation(e.to_string()))?
    };
    Ok(Json(
        state.db.sales().cancel(&id, request.reason.as_deref()).await?,
    ))
}
