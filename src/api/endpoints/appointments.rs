//! Appointment endpoints.
//!
//! `GET /patient-appointments/:patient_id` lists one patient's
//! appointments in the order they were booked.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::resolve_caller;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, CallerContext};
use crate::api::views::{AppointmentView, ViewLoader};
use crate::clinical::{self, AppointmentFields};
use crate::models::enums::AppointmentStatus;
use crate::models::AppointmentFilter;
use crate::validation::ValidationErrors;

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<String>,
    pub service_id: Option<String>,
    pub status: Option<String>,
}

/// `GET /appointments`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    query: Result<Query<AppointmentQuery>, QueryRejection>,
) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let Query(query) = query?;
    let mut errors = ValidationErrors::new();
    let filter = AppointmentFilter {
        patient_id: query
            .patient_id
            .as_deref()
            .and_then(|raw| errors.parse_uuid("patient_id", raw)),
        service_id: query
            .service_id
            .as_deref()
            .and_then(|raw| errors.parse_uuid("service_id", raw)),
        status: query.status.as_deref().and_then(|raw| {
            errors.parse_choice::<AppointmentStatus>("status", &raw.to_ascii_lowercase())
        }),
    };
    errors.into_result().map_err(ApiError::Validation)?;

    let conn = ctx.core.open_db()?;
    let appointments = clinical::list_appointments_filtered(&conn, &filter)?;
    Ok(Json(ViewLoader::new(&conn).appointments(appointments)?))
}

/// `GET /patient-appointments/:patient_id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let patient_id = parse_id(&patient_id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let appointments = clinical::list_appointments(&conn, &patient_id)?;
    Ok(Json(ViewLoader::new(&conn).appointments(appointments)?))
}

/// `POST /appointments`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<AppointmentFields>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let appointment =
        clinical::create_appointment(&conn, ctx.core.config.write_policy, &caller, &fields)?;
    let appointment = ViewLoader::new(&conn).appointment(appointment)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `GET /appointments/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentView>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    let appointment = clinical::get_appointment(&conn, &id)?;
    Ok(Json(ViewLoader::new(&conn).appointment(appointment)?))
}

/// `PUT/PATCH /appointments/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentFields>, JsonRejection>,
) -> Result<Json<AppointmentView>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let Json(fields) = payload?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    let appointment = clinical::update_appointment(
        &conn,
        ctx.core.config.write_policy,
        &caller,
        &id,
        &fields,
    )?;
    Ok(Json(ViewLoader::new(&conn).appointment(appointment)?))
}

/// `DELETE /appointments/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    let caller = resolve_caller(&conn, &caller)?;
    clinical::delete_appointment(&conn, ctx.core.config.write_policy, &caller, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
