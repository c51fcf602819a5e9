//! Audit logging middleware.
//!
//! Logs every API request with caller identity, method, path and
//! response status. Runs innermost (after auth has injected CallerContext).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, CallerContext};
use crate::core_state::AccessSource;

/// Log API access for audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();

    // Caller context is present only behind the auth middleware
    let source = req
        .extensions()
        .get::<CallerContext>()
        .map(|c| AccessSource::Identity(c.identity_id))
        .unwrap_or(AccessSource::Anonymous);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
