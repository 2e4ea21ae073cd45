//! Dashboard aggregates.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::state::AppState;
use mostrador_db::repository::dashboard::{DashboardSummary, TopProduct, TopProductsQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/summary", get(summary))
        .route("/dashboard/top-products", get(top_products))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// `YYYY-MM-DD`, UTC. Defaults to today.
    pub date: Option<NaiveDate>,
}

async fn summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<DashboardSummary>> {
    Ok(Json(state.db.dashboard().summary(query.date).await?))
}

async fn top_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopProductsQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    Ok(Json(state.db.dashboard().top_products(&query).await?))
}
