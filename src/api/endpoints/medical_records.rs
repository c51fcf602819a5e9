//! Medical record endpoints. Reads are scoped to the caller: patients see
//! only their own records, full-access staff see everything.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::resolve_caller;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::api::views::{MedicalRecordView, ViewLoader};
use crate::clinical::{self, MedicalRecordFields};
use crate::models::enums::VisitType;
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
pub struct MedicalRecordQuery {
    pub patient_id: Option<String>,
    pub visit_type: Option<String>,
}

/// `GET /medical-records`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    query: Result<Query<MedicalRecordQuery>, QueryRejection>,
) -> Result<Json<Vec<MedicalRecordView>>, ApiError> {
    let Query(query) = query?;
    let mut errors = ValidationErrors::new();
    let patient_id = query
        .patient_id
        .as_deref()
        .and_then(|raw| errors.parse_uuid("patient_id", raw));
    let visit_type = query
        .visit_type
        .as_deref()
        .and_then(|raw| errors.parse_choice::<VisitType>("visit_type", &raw.to_ascii_lowercase()));
    errors.into_result().map_err(ApiError::Validation)?;

    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let records = clinical::list_medical_records(&conn, &caller, patient_id, visit_type)?;
    Ok(Json(ViewLoader::new(&conn).records(records)?))
}

/// `POST /medical-records`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<MedicalRecordFields>, JsonRejection>,
) -> Result<(StatusCode, Json<MedicalRecordView>), ApiError> {
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let record =
        clinical::create_medical_record(&conn, ctx.core.config.write_policy, &caller, &fields)?;
    let record = ViewLoader::new(&conn).record(record)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /medical-records/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let id = parse_id(&id, "Medical record")?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let record = clinical::get_medical_record(&conn, &caller, &id)?;
    Ok(Json(ViewLoader::new(&conn).record(record)?))
}

/// `PUT/PATCH /medical-records/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<MedicalRecordFields>, JsonRejection>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let id = parse_id(&id, "Medical record")?;
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let record = clinical::update_medical_record(
        &conn,
        ctx.core.config.write_policy,
        &caller,
        &id,
        &fields,
    )?;
    Ok(Json(ViewLoader::new(&conn).record(record)?))
}

/// `DELETE /medical-records/:id`. Test results go with it.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Medical record")?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    clinical::delete_medical_record(&conn, ctx.core.config.write_policy, &caller, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
