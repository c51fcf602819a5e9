//! Repository layer: one repository per entity over a borrowed connection.
//!
//! Repositories borrow a `Connection`, so they work the same over a plain
//! connection or inside a `Transaction` (which derefs to `Connection`).

mod appointment;
mod identity;
mod medical_record;
mod patient;
mod service;
mod session;
mod staff;
mod test_result;

use uuid::Uuid;

use super::DatabaseError;

/// Base repository operations for any entity
pub trait Repository<T, F> {
    fn insert(&self, entity: &T) -> Result<Uuid, DatabaseError>;
    fn get(&self, id: &Uuid) -> Result<Option<T>, DatabaseError>;
    fn update(&self, entity: &T) -> Result<(), DatabaseError>;
    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError>;
    fn list(&self, filter: &F) -> Result<Vec<T>, DatabaseError>;
}

pub use appointment::*;
pub use identity::*;
pub use medical_record::*;
pub use patient::*;
pub use service::*;
pub use session::*;
pub use staff::*;
pub use test_result::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use super::*;
    use crate::models::enums::*;
    use crate::models::*;

    pub fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    pub fn make_identity(conn: &Connection, username: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            username: username.into(),
            email: format!("{username}@hospital.test"),
            password_hash: "pbkdf2_sha256$1$c2FsdA$aGFzaA".into(),
            first_name: String::new(),
            last_name: String::new(),
            created_at: Utc::now(),
        };
        IdentityRepo::new(conn).insert(&identity).unwrap();
        identity
    }

    pub fn make_patient(conn: &Connection, username: &str) -> Patient {
        let identity = make_identity(conn, username);
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            identity_id: identity.id,
            qr_token: Uuid::new_v4().to_string(),
            first_name: "Awa".into(),
            last_name: username.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1988, 4, 12).unwrap(),
            gender: Gender::Female,
            blood_type: "O+".into(),
            address: String::new(),
            phone_number: "+221700000000".into(),
            emergency_contact: "Moussa".into(),
            emergency_phone: "+221700000001".into(),
            fingerprint_hash: None,
            qr_code_path: None,
            created_at: now,
            updated_at: now,
        };
        PatientRepo::new(conn).insert(&patient).unwrap();
        patient
    }

    pub fn make_service(conn: &Connection, name: &str) -> Service {
        let service = Service {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            location: "Building A".into(),
        };
        ServiceRepo::new(conn).insert(&service).unwrap();
        service
    }

    pub fn make_record(
        conn: &Connection,
        patient_id: Uuid,
        service_id: Option<Uuid>,
        visit_date: DateTime<Utc>,
    ) -> MedicalRecord {
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id,
            service_id,
            visit_type: VisitType::Consultation,
            visit_date,
            symptoms: "Fever".into(),
            diagnosis: "Malaria".into(),
            treatment: "ACT".into(),
            prescription: String::new(),
            doctor_name: "Dr. Diallo".into(),
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        MedicalRecordRepo::new(conn).insert(&record).unwrap();
        record
    }

    pub fn make_appointment(
        conn: &Connection,
        patient_id: Uuid,
        service_id: Option<Uuid>,
        created_offset_secs: i64,
    ) -> Appointment {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            service_id,
            appointment_date: at("2024-06-01T09:00:00Z"),
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
            created_at: at("2024-05-01T00:00:00Z") + Duration::seconds(created_offset_secs),
        };
        AppointmentRepo::new(conn).insert(&appointment).unwrap();
        appointment
    }
}
