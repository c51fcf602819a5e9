//! Account and session endpoints.
//!
//! - `POST /register`: create an identity (and a staff role when `role` is set)
//! - `POST /token`: exchange credentials for an access/refresh pair
//! - `POST /token/refresh`: new access token from a refresh token
//! - `GET /me`: the caller's identity and role

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::identity::{self, AccessCredential, CallerProfile, RegisterRequest, SessionCredential};
use crate::validation::ValidationErrors;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /register`
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = payload?;
    run_blocking(&ctx, move |core, conn| {
        identity::register(conn, &request, core.config.pbkdf2_iterations)?;
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created successfully",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// `POST /token`
pub async fn token(
    State(ctx): State<ApiContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<SessionCredential>, ApiError> {
    let Json(request) = payload?;
    let mut errors = ValidationErrors::new();
    let username = errors.require("username", request.username.as_deref());
    let password = request.password.as_deref().filter(|p| !p.is_empty());
    if password.is_none() {
        errors.add("password", crate::validation::REQUIRED);
    }
    let (Some(username), Some(password)) = (username, password) else {
        return Err(ApiError::Validation(errors));
    };
    let (username, password) = (username.to_string(), password.to_string());

    let credential = run_blocking(&ctx, move |core, conn| {
        Ok(identity::authenticate(conn, &core.config, &username, &password)?)
    })
    .await?;
    Ok(Json(credential))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// `POST /token/refresh`
pub async fn refresh(
    State(ctx): State<ApiContext>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessCredential>, ApiError> {
    let Json(request) = payload?;
    let mut errors = ValidationErrors::new();
    let Some(refresh) = errors.require("refresh", request.refresh.as_deref()) else {
        return Err(ApiError::Validation(errors));
    };

    let conn = ctx.core.open_db()?;
    Ok(Json(identity::refresh(&conn, &ctx.core.config, refresh)?))
}

/// `GET /me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<CallerProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::caller_profile(&conn, caller.identity_id)?))
}
