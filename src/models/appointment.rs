use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Unset once the referenced service is deleted.
    pub service_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}
