use serde::Serialize;
use uuid::Uuid;

/// A hospital department or unit that visits and appointments attach to.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
}
