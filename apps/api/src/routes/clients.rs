//! Clients. `DELETE` deactivates; sales and orders keep pointing at the row.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::Client;
use mostrador_db::repository::client::{ClientFilter, ClientInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{id}",
            get(get_client).put(update_client).delete(deactivate_client),
        )
}

async fn list_clients(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ClientFilter>,
) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(state.db.clients().list(&filter).await?))
}

async fn create_client(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ClientInput>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    let client = state.db.clients().create(&body).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

async fn get_client(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Client>> {
    Ok(Json(state.db.clients().get(&id).await?))
}

async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ClientInput>,
) -> ApiResult<Json<Client>> {
    Ok(Json(state.db.clients().update(&id, &body).await?))
}

async fn deactivate_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.clients().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
