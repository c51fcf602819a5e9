//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolves.
#[derive(Debug, Clone, Copy)]
pub struct CallerContext {
    pub identity_id: Uuid,
}

/// Parse a path id. Malformed ids cannot name a row, so they are 404s.
pub fn parse_id(raw: &str, entity: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{entity} not found")))
}
