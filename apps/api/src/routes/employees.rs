//! Employees. `DELETE` deactivates; rows are kept for history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use mostrador_core::Employee;
use mostrador_db::repository::employee::EmployeeInput;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee).put(update_employee).delete(deactivate_employee),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_employees(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmployeeQuery>,
) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.db.employees().list(query.include_inactive).await?))
}

async fn create_employee(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmployeeInput>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let employee = state.db.employees().create(&body).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.db.employees().get(&id).await?))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<EmployeeInput>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.db.employees().update(&id, &body).await?))
}

async fn deactivate_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.employees().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
