use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// An authenticatable account. Linked to at most one Patient or Staff row.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// Live session row. Token values themselves are never stored.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_hash: [u8; 32],
    pub refresh_hash: [u8; 32],
    pub identity_id: Uuid,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
