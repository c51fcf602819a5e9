//! Hospital service catalogue endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::clinical::{self, ServiceFields};
use crate::models::{Service, ServiceFilter};

#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub search: Option<String>,
}

/// `GET /services`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    query: Result<Query<ServiceQuery>, QueryRejection>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let Query(query) = query?;
    let filter = ServiceFilter {
        name: query.search.filter(|s| !s.trim().is_empty()),
    };
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::list_services(&conn, &filter)?))
}

/// `POST /services`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    payload: Result<Json<ServiceFields>, JsonRejection>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let service = clinical::create_service(&conn, &fields)?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// `GET /services/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<Service>, ApiError> {
    let id = parse_id(&id, "Service")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::get_service(&conn, &id)?))
}

/// `PUT/PATCH /services/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<ServiceFields>, JsonRejection>,
) -> Result<Json<Service>, ApiError> {
    let id = parse_id(&id, "Service")?;
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::update_service(&conn, &id, &fields)?))
}

/// `DELETE /services/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Service")?;
    let conn = ctx.core.open_db()?;
    clinical::delete_service(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
