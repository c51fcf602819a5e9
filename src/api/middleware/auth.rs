//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! sessions table, and injects `CallerContext` into request extensions
//! for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::identity;

/// Require a live access token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `CallerContext` and adds `Cache-Control: no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => no_store(err.into_response()).await,
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // 2. Resolve against stored session hashes
    let identity_id = {
        let conn = ctx.core.open_db()?;
        identity::resolve_access_token(&conn, &token)?
    }; // connection dropped before any .await

    // 3. Inject caller context for downstream handlers
    req.extensions_mut().insert(CallerContext { identity_id });

    // 4. Process request
    let response = next.run(req).await;

    Ok(no_store(response).await)
}

/// Mark a response as not cacheable.
pub async fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    response
}
