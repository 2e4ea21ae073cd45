//! Sale returns, partial or full.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::{Return, ReturnDetail};
use mostrador_db::repository::returns::NewReturn;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/returns", get(list_returns).post(register_return))
        .route("/returns/{id}", get(get_return))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnQuery {
    pub sale_id: Option<String>,
}

async fn list_returns(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReturnQuery>,
) -> ApiResult<Json<Vec<Return>>> {
    Ok(Json(state.db.returns().list(query.sale_id.as_deref()).await?))
}

async fn register_return(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewReturn>,
) -> ApiResult<(StatusCode, Json<ReturnDetail>)> {
    let detail = state.db.returns().register(&body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_return(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ReturnDetail>> {
    Ok(Json(state.db.returns().get(&id).await?))
}
