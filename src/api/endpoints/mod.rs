//! API endpoint handlers, one module per resource.

pub mod appointments;
pub mod auth;
pub mod health;
pub mod medical_records;
pub mod patients;
pub mod services;
pub mod staff;
pub mod test_results;

use rusqlite::Connection;

use crate::access::Caller;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::core_state::CoreState;

/// Load role rows for the authenticated caller.
pub(crate) fn resolve_caller(conn: &Connection, ctx: &CallerContext) -> Result<Caller, ApiError> {
    Ok(Caller::resolve(conn, ctx.identity_id)?)
}

/// Run password hashing and its database work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(ctx: &ApiContext, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&CoreState, &Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || {
        let conn = core.open_db()?;
        work(&core, &conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
