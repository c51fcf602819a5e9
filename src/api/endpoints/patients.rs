//! Patient directory and lookup endpoints.
//!
//! - `GET/POST /patients`
//! - `GET/PUT/PATCH/DELETE /patients/:id`
//! - `GET /patients/:id/qr`: SVG QR artifact
//! - `POST /patients/qr_auth`: lookup by scanned QR payload
//! - `POST /patients/fingerprint_auth`: lookup by biometric hash

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::api::views::{PatientView, ViewLoader};
use crate::gateway::{self, NewPatient, PatientFields};
use crate::models::PatientFilter;
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub search: Option<String>,
}

/// `GET /patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    query: Result<Query<PatientQuery>, QueryRejection>,
) -> Result<Json<Vec<PatientView>>, ApiError> {
    let Query(query) = query?;
    let filter = PatientFilter {
        name: query.search.filter(|s| !s.trim().is_empty()),
    };
    let conn = ctx.core.open_db()?;
    let patients = gateway::list_patients(&conn, &filter)?;
    Ok(Json(ViewLoader::new(&conn).patients(patients)?))
}

/// `POST /patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> Result<(StatusCode, Json<PatientView>), ApiError> {
    let Json(request) = payload?;
    let patient = run_blocking(&ctx, move |core, conn| {
        let patient = gateway::create_patient(conn, &core.config, &request)?;
        Ok(ViewLoader::new(conn).patient(patient)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /patients/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<PatientView>, ApiError> {
    let id = parse_id(&id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let patient = gateway::get_patient(&conn, &id)?;
    Ok(Json(ViewLoader::new(&conn).patient(patient)?))
}

/// `PUT/PATCH /patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<PatientFields>, JsonRejection>,
) -> Result<Json<PatientView>, ApiError> {
    let id = parse_id(&id, "Patient")?;
    let Json(changes) = payload?;
    let conn = ctx.core.open_db()?;
    let patient = gateway::update_patient(&conn, &id, &changes)?;
    Ok(Json(ViewLoader::new(&conn).patient(patient)?))
}

/// `DELETE /patients/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Patient")?;
    let conn = ctx.core.open_db()?;
    gateway::delete_patient(&conn, &ctx.core.config, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /patients/:id/qr`
pub async fn qr(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let svg = gateway::qr_artifact(&conn, &ctx.core.config, &id)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

#[derive(Debug, Deserialize)]
pub struct QrAuthRequest {
    pub qr_data: Option<String>,
}

/// `POST /patients/qr_auth`
pub async fn qr_auth(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    payload: Result<Json<QrAuthRequest>, JsonRejection>,
) -> Result<Json<PatientView>, ApiError> {
    let Json(request) = payload?;
    let mut errors = ValidationErrors::new();
    let Some(token) = errors.require("qr_data", request.qr_data.as_deref()) else {
        return Err(ApiError::Validation(errors));
    };
    let conn = ctx.core.open_db()?;
    let patient = gateway::lookup_by_token(&conn, token)?;
    Ok(Json(ViewLoader::new(&conn).patient(patient)?))
}

#[derive(Debug, Deserialize)]
pub struct FingerprintAuthRequest {
    #[serde(alias = "fingerprint_data")]
    pub fingerprint_hash: Option<String>,
}

/// `POST /patients/fingerprint_auth`
pub async fn fingerprint_auth(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    payload: Result<Json<FingerprintAuthRequest>, JsonRejection>,
) -> Result<Json<PatientView>, ApiError> {
    let Json(request) = payload?;
    let mut errors = ValidationErrors::new();
    let Some(hash) = errors.require("fingerprint_hash", request.fingerprint_hash.as_deref()) else {
        return Err(ApiError::Validation(errors));
    };
    let conn = ctx.core.open_db()?;
    let patient = gateway::lookup_by_biometric_hash(&conn, hash)?;
    Ok(Json(ViewLoader::new(&conn).patient(patient)?))
}
