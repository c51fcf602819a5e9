//! Test result endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::resolve_caller;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::clinical::{self, TestResultFields};
use crate::models::{TestResult, TestResultFilter};
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
pub struct TestResultQuery {
    pub medical_record_id: Option<String>,
}

/// `GET /test-results`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    query: Result<Query<TestResultQuery>, QueryRejection>,
) -> Result<Json<Vec<TestResult>>, ApiError> {
    let Query(query) = query?;
    let mut errors = ValidationErrors::new();
    let filter = TestResultFilter {
        medical_record_id: query
            .medical_record_id
            .as_deref()
            .and_then(|raw| errors.parse_uuid("medical_record_id", raw)),
    };
    errors.into_result().map_err(ApiError::Validation)?;

    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::list_test_results(&conn, &filter)?))
}

/// `POST /test-results`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<TestResultFields>, JsonRejection>,
) -> Result<(StatusCode, Json<TestResult>), ApiError> {
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let result =
        clinical::create_test_result(&conn, ctx.core.config.write_policy, &caller, &fields)?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `GET /test-results/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<TestResult>, ApiError> {
    let id = parse_id(&id, "Test result")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::get_test_result(&conn, &id)?))
}

/// `PUT/PATCH /test-results/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<TestResultFields>, JsonRejection>,
) -> Result<Json<TestResult>, ApiError> {
    let id = parse_id(&id, "Test result")?;
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    Ok(Json(clinical::update_test_result(
        &conn,
        ctx.core.config.write_policy,
        &caller,
        &id,
        &fields,
    )?))
}

/// `DELETE /test-results/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Test result")?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    clinical::delete_test_result(&conn, ctx.core.config.write_policy, &caller, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
