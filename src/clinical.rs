//! Clinical record store: services, medical records, test results and
//! appointments.
//!
//! Medical record reads and writes go through the caller's `RecordScope`.
//! Creating or modifying records, results and appointments is gated by the
//! configured `WritePolicy`. Updates are partial: absent fields keep their
//! current value.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::{self, Caller, WritePolicy};
use crate::db::repository::{
    AppointmentRepo, MedicalRecordRepo, PatientRepo, Repository, ServiceRepo, TestResultRepo,
};
use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, VisitType};
use crate::models::{
    Appointment, AppointmentFilter, MedicalRecord, MedicalRecordFilter, Service, ServiceFilter,
    TestResult, TestResultFilter,
};
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ClinicalError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Not permitted by write policy")]
    Forbidden,
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for ClinicalError {
    fn from(err: rusqlite::Error) -> Self {
        ClinicalError::Database(err.into())
    }
}

impl From<ValidationErrors> for ClinicalError {
    fn from(errors: ValidationErrors) -> Self {
        ClinicalError::Validation(errors)
    }
}

fn ensure_can_write(policy: WritePolicy, caller: &Caller) -> Result<(), ClinicalError> {
    let decision = access::check_clinical_write(policy, caller);
    if !decision.allowed {
        tracing::warn!(identity_id = %caller.identity_id, reason = ?decision.reason, "Clinical write denied");
        return Err(ClinicalError::Forbidden);
    }
    Ok(())
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Choice values are stored lowercase; accept any case on input.
fn parse_lower<T: std::str::FromStr>(errors: &mut ValidationErrors, field: &str, raw: &str) -> Option<T> {
    errors.parse_choice(field, &raw.trim().to_ascii_lowercase())
}

fn require_patient(conn: &Connection, id: &Uuid) -> Result<(), ClinicalError> {
    if PatientRepo::new(conn).exists(id)? {
        Ok(())
    } else {
        Err(ClinicalError::NotFound("Patient"))
    }
}

fn require_service(conn: &Connection, id: &Uuid) -> Result<(), ClinicalError> {
    if ServiceRepo::new(conn).exists(id)? {
        Ok(())
    } else {
        Err(ClinicalError::NotFound("Service"))
    }
}

// ═══════════════════════════════════════════════════════════
// Services
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

pub fn list_services(conn: &Connection, filter: &ServiceFilter) -> Result<Vec<Service>, ClinicalError> {
    Ok(ServiceRepo::new(conn).list(filter)?)
}

pub fn get_service(conn: &Connection, id: &Uuid) -> Result<Service, ClinicalError> {
    ServiceRepo::new(conn)
        .get(id)?
        .ok_or(ClinicalError::NotFound("Service"))
}

pub fn create_service(conn: &Connection, fields: &ServiceFields) -> Result<Service, ClinicalError> {
    let mut errors = ValidationErrors::new();
    let name = errors.require("name", fields.name.as_deref()).map(String::from);
    let location = errors.require("location", fields.location.as_deref()).map(String::from);
    errors.into_result()?;

    let service = Service {
        id: Uuid::new_v4(),
        name: name.unwrap_or_default(),
        description: text(&fields.description),
        location: location.unwrap_or_default(),
    };
    ServiceRepo::new(conn).insert(&service)?;
    tracing::info!(service_id = %service.id, name = %service.name, "Service created");
    Ok(service)
}

pub fn update_service(
    conn: &Connection,
    id: &Uuid,
    fields: &ServiceFields,
) -> Result<Service, ClinicalError> {
    let repo = ServiceRepo::new(conn);
    let mut service = repo.get(id)?.ok_or(ClinicalError::NotFound("Service"))?;

    let mut errors = ValidationErrors::new();
    errors.patch_text("name", &mut service.name, fields.name.as_deref(), true);
    errors.patch_text("description", &mut service.description, fields.description.as_deref(), false);
    errors.patch_text("location", &mut service.location, fields.location.as_deref(), true);
    errors.into_result()?;

    repo.update(&service)?;
    Ok(service)
}

/// Dependent records and appointments keep existing with the service unset.
pub fn delete_service(conn: &Connection, id: &Uuid) -> Result<(), ClinicalError> {
    match ServiceRepo::new(conn).delete(id) {
        Ok(()) => {
            tracing::info!(service_id = %id, "Service deleted");
            Ok(())
        }
        Err(DatabaseError::NotFound { .. }) => Err(ClinicalError::NotFound("Service")),
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════
// Medical records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalRecordFields {
    pub patient_id: Option<String>,
    pub service_id: Option<String>,
    pub visit_type: Option<String>,
    pub visit_date: Option<String>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub doctor_name: Option<String>,
    pub notes: Option<String>,
}

/// Records visible to `caller`, newest visit first.
pub fn list_medical_records(
    conn: &Connection,
    caller: &Caller,
    patient_id: Option<Uuid>,
    visit_type: Option<VisitType>,
) -> Result<Vec<MedicalRecord>, ClinicalError> {
    let filter = MedicalRecordFilter {
        scope: caller.scope(),
        patient_id,
        visit_type,
    };
    Ok(MedicalRecordRepo::new(conn).list(&filter)?)
}

/// A record outside the caller's scope is reported as missing.
pub fn get_medical_record(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<MedicalRecord, ClinicalError> {
    MedicalRecordRepo::new(conn)
        .get_scoped(id, &caller.scope())?
        .ok_or(ClinicalError::NotFound("Medical record"))
}

pub fn create_medical_record(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    fields: &MedicalRecordFields,
) -> Result<MedicalRecord, ClinicalError> {
    ensure_can_write(policy, caller)?;

    let mut errors = ValidationErrors::new();
    let patient_id = errors
        .require("patient_id", fields.patient_id.as_deref())
        .and_then(|raw| errors.parse_uuid("patient_id", raw));
    // An unknown patient wins over field errors.
    if let Some(patient_id) = &patient_id {
        require_patient(conn, patient_id)?;
    }
    let service_id = fields
        .service_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| errors.parse_uuid("service_id", raw));
    let visit_type = errors
        .require("visit_type", fields.visit_type.as_deref())
        .and_then(|raw| parse_lower::<VisitType>(&mut errors, "visit_type", raw));
    let visit_date = match fields.visit_date.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => errors.parse_timestamp("visit_date", raw),
        None => Some(Utc::now()),
    };
    let symptoms = errors.require("symptoms", fields.symptoms.as_deref()).map(String::from);
    let diagnosis = errors.require("diagnosis", fields.diagnosis.as_deref()).map(String::from);
    let treatment = errors.require("treatment", fields.treatment.as_deref()).map(String::from);
    let doctor_name = errors
        .require("doctor_name", fields.doctor_name.as_deref())
        .map(String::from);

    let (Some(patient_id), Some(visit_type), Some(visit_date)) = (patient_id, visit_type, visit_date)
    else {
        return Err(errors.into());
    };
    errors.into_result()?;

    // An unknown service is dropped rather than rejected.
    let service_id = match service_id {
        Some(id) if ServiceRepo::new(conn).exists(&id)? => Some(id),
        _ => None,
    };

    let now = Utc::now();
    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id,
        service_id,
        visit_type,
        visit_date,
        symptoms: symptoms.unwrap_or_default(),
        diagnosis: diagnosis.unwrap_or_default(),
        treatment: treatment.unwrap_or_default(),
        prescription: text(&fields.prescription),
        doctor_name: doctor_name.unwrap_or_default(),
        notes: text(&fields.notes),
        created_at: now,
        updated_at: now,
    };
    MedicalRecordRepo::new(conn).insert(&record)?;
    tracing::info!(record_id = %record.id, patient_id = %record.patient_id, "Medical record created");
    Ok(record)
}

pub fn update_medical_record(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
    fields: &MedicalRecordFields,
) -> Result<MedicalRecord, ClinicalError> {
    ensure_can_write(policy, caller)?;
    let mut record = get_medical_record(conn, caller, id)?;

    let mut errors = ValidationErrors::new();
    let patient_id = fields
        .patient_id
        .as_deref()
        .and_then(|raw| errors.parse_uuid("patient_id", raw));
    let service_id = fields
        .service_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| errors.parse_uuid("service_id", raw));
    if let Some(raw) = fields.visit_type.as_deref() {
        if let Some(visit_type) = parse_lower::<VisitType>(&mut errors, "visit_type", raw) {
            record.visit_type = visit_type;
        }
    }
    if let Some(raw) = fields.visit_date.as_deref() {
        if let Some(visit_date) = errors.parse_timestamp("visit_date", raw) {
            record.visit_date = visit_date;
        }
    }
    errors.patch_text("symptoms", &mut record.symptoms, fields.symptoms.as_deref(), true);
    errors.patch_text("diagnosis", &mut record.diagnosis, fields.diagnosis.as_deref(), true);
    errors.patch_text("treatment", &mut record.treatment, fields.treatment.as_deref(), true);
    errors.patch_text("prescription", &mut record.prescription, fields.prescription.as_deref(), false);
    errors.patch_text("doctor_name", &mut record.doctor_name, fields.doctor_name.as_deref(), true);
    errors.patch_text("notes", &mut record.notes, fields.notes.as_deref(), false);
    errors.into_result()?;

    if let Some(patient_id) = patient_id {
        require_patient(conn, &patient_id)?;
        record.patient_id = patient_id;
    }
    if let Some(service_id) = service_id {
        if ServiceRepo::new(conn).exists(&service_id)? {
            record.service_id = Some(service_id);
        }
    }

    record.updated_at = Utc::now();
    MedicalRecordRepo::new(conn).update(&record)?;
    Ok(record)
}

/// Removes the record and its test results.
pub fn delete_medical_record(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
) -> Result<(), ClinicalError> {
    ensure_can_write(policy, caller)?;
    let record = get_medical_record(conn, caller, id)?;
    MedicalRecordRepo::new(conn).delete(&record.id)?;
    tracing::info!(record_id = %id, "Medical record deleted");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Test results
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestResultFields {
    pub medical_record_id: Option<String>,
    pub test_name: Option<String>,
    pub test_date: Option<String>,
    pub result: Option<String>,
    #[serde(alias = "file")]
    pub file_path: Option<String>,
    pub normal_range: Option<String>,
}

pub fn list_test_results(
    conn: &Connection,
    filter: &TestResultFilter,
) -> Result<Vec<TestResult>, ClinicalError> {
    Ok(TestResultRepo::new(conn).list(filter)?)
}

pub fn get_test_result(conn: &Connection, id: &Uuid) -> Result<TestResult, ClinicalError> {
    TestResultRepo::new(conn)
        .get(id)?
        .ok_or(ClinicalError::NotFound("Test result"))
}

pub fn create_test_result(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    fields: &TestResultFields,
) -> Result<TestResult, ClinicalError> {
    ensure_can_write(policy, caller)?;

    let mut errors = ValidationErrors::new();
    let medical_record_id = errors
        .require("medical_record_id", fields.medical_record_id.as_deref())
        .and_then(|raw| errors.parse_uuid("medical_record_id", raw));
    let test_name = errors.require("test_name", fields.test_name.as_deref()).map(String::from);
    let result = errors.require("result", fields.result.as_deref()).map(String::from);
    let test_date = match fields.test_date.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => errors.parse_timestamp("test_date", raw),
        None => Some(Utc::now()),
    };

    let (Some(medical_record_id), Some(test_date)) = (medical_record_id, test_date) else {
        return Err(errors.into());
    };
    errors.into_result()?;

    if MedicalRecordRepo::new(conn).get(&medical_record_id)?.is_none() {
        return Err(ClinicalError::NotFound("Medical record"));
    }

    let test_result = TestResult {
        id: Uuid::new_v4(),
        medical_record_id,
        test_name: test_name.unwrap_or_default(),
        test_date,
        result: result.unwrap_or_default(),
        file_path: fields
            .file_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from),
        normal_range: text(&fields.normal_range),
    };
    TestResultRepo::new(conn).insert(&test_result)?;
    Ok(test_result)
}

pub fn update_test_result(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
    fields: &TestResultFields,
) -> Result<TestResult, ClinicalError> {
    ensure_can_write(policy, caller)?;
    let repo = TestResultRepo::new(conn);
    let mut test_result = repo.get(id)?.ok_or(ClinicalError::NotFound("Test result"))?;

    let mut errors = ValidationErrors::new();
    let medical_record_id = fields
        .medical_record_id
        .as_deref()
        .and_then(|raw| errors.parse_uuid("medical_record_id", raw));
    if let Some(raw) = fields.test_date.as_deref() {
        if let Some(test_date) = errors.parse_timestamp("test_date", raw) {
            test_result.test_date = test_date;
        }
    }
    errors.patch_text("test_name", &mut test_result.test_name, fields.test_name.as_deref(), true);
    errors.patch_text("result", &mut test_result.result, fields.result.as_deref(), true);
    errors.patch_text(
        "normal_range",
        &mut test_result.normal_range,
        fields.normal_range.as_deref(),
        false,
    );
    if let Some(path) = fields.file_path.as_deref() {
        let path = path.trim();
        test_result.file_path = (!path.is_empty()).then(|| path.to_string());
    }
    errors.into_result()?;

    if let Some(record_id) = medical_record_id {
        if MedicalRecordRepo::new(conn).get(&record_id)?.is_none() {
            return Err(ClinicalError::NotFound("Medical record"));
        }
        test_result.medical_record_id = record_id;
    }

    repo.update(&test_result)?;
    Ok(test_result)
}

pub fn delete_test_result(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
) -> Result<(), ClinicalError> {
    ensure_can_write(policy, caller)?;
    match TestResultRepo::new(conn).delete(id) {
        Ok(()) => Ok(()),
        Err(DatabaseError::NotFound { .. }) => Err(ClinicalError::NotFound("Test result")),
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFields {
    pub patient_id: Option<String>,
    pub service_id: Option<String>,
    pub appointment_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub fn list_appointments_filtered(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, ClinicalError> {
    Ok(AppointmentRepo::new(conn).list(filter)?)
}

/// All appointments of `patient_id` in creation order. Unknown patients
/// simply have none.
pub fn list_appointments(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Appointment>, ClinicalError> {
    Ok(AppointmentRepo::new(conn).list_for_patient(patient_id)?)
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Appointment, ClinicalError> {
    AppointmentRepo::new(conn)
        .get(id)?
        .ok_or(ClinicalError::NotFound("Appointment"))
}

pub fn create_appointment(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    fields: &AppointmentFields,
) -> Result<Appointment, ClinicalError> {
    ensure_can_write(policy, caller)?;

    let mut errors = ValidationErrors::new();
    let patient_id = errors
        .require("patient_id", fields.patient_id.as_deref())
        .and_then(|raw| errors.parse_uuid("patient_id", raw));
    let service_id = errors
        .require("service_id", fields.service_id.as_deref())
        .and_then(|raw| errors.parse_uuid("service_id", raw));
    let appointment_date = errors
        .require("appointment_date", fields.appointment_date.as_deref())
        .and_then(|raw| errors.parse_timestamp("appointment_date", raw));
    let status = match fields.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => parse_lower::<AppointmentStatus>(&mut errors, "status", raw),
        None => Some(AppointmentStatus::default()),
    };

    let (Some(patient_id), Some(service_id), Some(appointment_date), Some(status)) =
        (patient_id, service_id, appointment_date, status)
    else {
        return Err(errors.into());
    };
    errors.into_result()?;

    require_patient(conn, &patient_id)?;
    require_service(conn, &service_id)?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        service_id: Some(service_id),
        appointment_date,
        status,
        notes: text(&fields.notes),
        created_at: Utc::now(),
    };
    AppointmentRepo::new(conn).insert(&appointment)?;
    tracing::info!(appointment_id = %appointment.id, patient_id = %patient_id, "Appointment created");
    Ok(appointment)
}

/// Status may be set to any value; transitions are not validated.
pub fn update_appointment(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
    fields: &AppointmentFields,
) -> Result<Appointment, ClinicalError> {
    ensure_can_write(policy, caller)?;
    let repo = AppointmentRepo::new(conn);
    let mut appointment = repo.get(id)?.ok_or(ClinicalError::NotFound("Appointment"))?;

    let mut errors = ValidationErrors::new();
    let patient_id = fields
        .patient_id
        .as_deref()
        .and_then(|raw| errors.parse_uuid("patient_id", raw));
    let service_id = fields
        .service_id
        .as_deref()
        .and_then(|raw| errors.parse_uuid("service_id", raw));
    if let Some(raw) = fields.appointment_date.as_deref() {
        if let Some(date) = errors.parse_timestamp("appointment_date", raw) {
            appointment.appointment_date = date;
        }
    }
    if let Some(raw) = fields.status.as_deref() {
        if let Some(status) = parse_lower::<AppointmentStatus>(&mut errors, "status", raw) {
            if !appointment.status.can_transition_to(status) && appointment.status != status {
                tracing::debug!(
                    appointment_id = %appointment.id,
                    from = %appointment.status,
                    to = %status,
                    "Appointment status set outside the usual lifecycle"
                );
            }
            appointment.status = status;
        }
    }
    errors.patch_text("notes", &mut appointment.notes, fields.notes.as_deref(), false);
    errors.into_result()?;

    if let Some(patient_id) = patient_id {
        require_patient(conn, &patient_id)?;
        appointment.patient_id = patient_id;
    }
    if let Some(service_id) = service_id {
        require_service(conn, &service_id)?;
        appointment.service_id = Some(service_id);
    }

    repo.update(&appointment)?;
    Ok(appointment)
}

pub fn delete_appointment(
    conn: &Connection,
    policy: WritePolicy,
    caller: &Caller,
    id: &Uuid,
) -> Result<(), ClinicalError> {
    ensure_can_write(policy, caller)?;
    match AppointmentRepo::new(conn).delete(id) {
        Ok(()) => Ok(()),
        Err(DatabaseError::NotFound { .. }) => Err(ClinicalError::NotFound("Appointment")),
        Err(e) => Err(e.into()),
    }
}
