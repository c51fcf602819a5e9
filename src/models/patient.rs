use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub identity_id: Uuid,
    /// Opaque lookup token rendered into the patient's QR code. Never changes.
    pub qr_token: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_type: String,
    pub address: String,
    pub phone_number: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    #[serde(skip_serializing)]
    pub fingerprint_hash: Option<String>,
    /// Path of the QR artifact, relative to the media directory.
    pub qr_code_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
