use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::VisitType;

#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Option<Uuid>,
    pub visit_type: VisitType,
    pub visit_date: DateTime<Utc>,
    pub symptoms: String,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: String,
    pub doctor_name: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
