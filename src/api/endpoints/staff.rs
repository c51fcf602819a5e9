//! Staff directory endpoints. Anyone authenticated may read; only
//! full-access staff may change a staff row.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use super::resolve_caller;
use crate::access;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::api::views::{StaffView, ViewLoader};
use crate::identity::{self, StaffChanges};
use crate::models::StaffFilter;

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub department: Option<String>,
}

/// `GET /staff`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    query: Result<Query<StaffQuery>, QueryRejection>,
) -> Result<Json<Vec<StaffView>>, ApiError> {
    let Query(query) = query?;
    let filter = StaffFilter {
        department: query.department.filter(|d| !d.trim().is_empty()),
    };
    let conn = ctx.core.open_db()?;
    let staff = identity::list_staff(&conn, &filter)?;
    Ok(Json(ViewLoader::new(&conn).staff_members(staff)?))
}

/// `GET /staff/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<StaffView>, ApiError> {
    let id = parse_id(&id, "Staff")?;
    let conn = ctx.core.open_db()?;
    let staff = identity::get_staff(&conn, &id)?;
    Ok(Json(ViewLoader::new(&conn).staff(staff)?))
}

/// `PATCH /staff/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<StaffChanges>, JsonRejection>,
) -> Result<Json<StaffView>, ApiError> {
    let id = parse_id(&id, "Staff")?;
    let Json(changes) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;

    let decision = access::check_directory_write(&caller);
    if !decision.allowed {
        tracing::warn!(identity_id = %caller.identity_id, staff_id = %id, "Staff update denied");
        return Err(ApiError::Forbidden("Staff changes require full access".into()));
    }

    let staff = identity::update_staff(&conn, &id, &changes)?;
    Ok(Json(ViewLoader::new(&conn).staff(staff)?))
}
