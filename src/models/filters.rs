use uuid::Uuid;

use super::enums::{AppointmentStatus, VisitType};

/// Row-level visibility for medical record reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Every record is visible.
    FullAccess,
    /// Only records whose patient belongs to this identity.
    SelfOnly(Uuid),
}

#[derive(Debug, Clone)]
pub struct MedicalRecordFilter {
    pub scope: RecordScope,
    pub patient_id: Option<Uuid>,
    pub visit_type: Option<VisitType>,
}

impl MedicalRecordFilter {
    pub fn scoped(scope: RecordScope) -> Self {
        Self {
            scope,
            patient_id: None,
            visit_type: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Default)]
pub struct TestResultFilter {
    pub medical_record_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct PatientFilter {
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct ServiceFilter {
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct StaffFilter {
    pub department: Option<String>,
}
