use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Staff {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub department: String,
    /// Bypasses patient-owner filtering on clinical reads.
    pub can_access_all: bool,
    /// Confirmed by a full-access staff member. Self-registered roles start unapproved.
    pub approved: bool,
}
