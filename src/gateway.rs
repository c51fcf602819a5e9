//! Patient gateway: creation with a QR artifact, lookup by QR token or
//! fingerprint hash, and the patient directory.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::repository::{PatientRepo, Repository};
use crate::db::DatabaseError;
use crate::identity::{self, IdentityError, NewAccount};
use crate::models::enums::Gender;
use crate::models::{Patient, PatientFilter};
use crate::qr::{self, QrError};
use crate::validation::{ValidationErrors, REQUIRED};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Patient not found")]
    NotFound,
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("QR artifact error: {0}")]
    Qr(#[from] QrError),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        GatewayError::Database(err.into())
    }
}

/// Demographic fields accepted on create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    #[serde(alias = "fingerprint_data")]
    pub fingerprint_hash: Option<String>,
}

/// `POST /patients` body: a nested account plus demographics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub user: Option<NewAccount>,
    #[serde(flatten)]
    pub fields: PatientFields,
}

// ═══════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════

/// Create identity + patient atomically and write the QR artifact.
///
/// The token is generated once here and never rewritten. If anything
/// after the artifact write fails, the artifact is removed again.
pub fn create_patient(
    conn: &Connection,
    config: &AppConfig,
    request: &NewPatient,
) -> Result<Patient, GatewayError> {
    let (account, demographics) = validate_new(request)?;

    let tx = conn.unchecked_transaction()?;
    let identity = identity::insert_account(&tx, account, config.pbkdf2_iterations)?;

    let now = Utc::now();
    let mut patient = Patient {
        id: Uuid::new_v4(),
        identity_id: identity.id,
        qr_token: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        qr_code_path: None,
        ..demographics
    };

    let reference = qr::write_artifact(&config.media_dir, &patient.id, &patient.qr_token)?;
    patient.qr_code_path = Some(reference.clone());

    let inserted = PatientRepo::new(&tx).insert(&patient);
    let stored = match inserted {
        Ok(_) => tx.commit().map_err(GatewayError::from),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = stored {
        if let Err(cleanup) = qr::remove_artifact(&config.media_dir, &reference) {
            tracing::warn!(error = %cleanup, patient_id = %patient.id, "Failed to remove orphaned QR artifact");
        }
        return Err(e);
    }

    tracing::info!(patient_id = %patient.id, username = %identity.username, "Patient created");
    Ok(patient)
}

/// Check required demographics and build a patient skeleton from them.
fn validate_new(request: &NewPatient) -> Result<(&NewAccount, Patient), GatewayError> {
    let f = &request.fields;
    let mut errors = ValidationErrors::new();

    let first_name = errors.require("first_name", f.first_name.as_deref());
    let last_name = errors.require("last_name", f.last_name.as_deref());
    let phone_number = errors.require("phone_number", f.phone_number.as_deref());
    let emergency_contact = errors.require("emergency_contact", f.emergency_contact.as_deref());
    let emergency_phone = errors.require("emergency_phone", f.emergency_phone.as_deref());
    let date_of_birth = errors
        .require("date_of_birth", f.date_of_birth.as_deref())
        .and_then(|raw| errors.parse_date("date_of_birth", raw));
    let gender = errors
        .require("gender", f.gender.as_deref())
        .and_then(|raw| errors.parse_choice::<Gender>("gender", raw));

    if request.user.is_none() {
        errors.add("user", REQUIRED);
    }

    match (
        request.user.as_ref(),
        first_name,
        last_name,
        phone_number,
        emergency_contact,
        emergency_phone,
        date_of_birth,
        gender,
    ) {
        (
            Some(account),
            Some(first),
            Some(last),
            Some(phone),
            Some(contact),
            Some(ephone),
            Some(dob),
            Some(gender),
        ) if errors.is_empty() => {
            let now = Utc::now();
            let patient = Patient {
                id: Uuid::nil(),
                identity_id: Uuid::nil(),
                qr_token: String::new(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                date_of_birth: dob,
                gender,
                blood_type: text(&f.blood_type),
                address: text(&f.address),
                phone_number: phone.to_string(),
                emergency_contact: contact.to_string(),
                emergency_phone: ephone.to_string(),
                fingerprint_hash: f.fingerprint_hash.clone(),
                qr_code_path: None,
                created_at: now,
                updated_at: now,
            };
            Ok((account, patient))
        }
        _ => Err(GatewayError::Validation(errors)),
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

// ═══════════════════════════════════════════════════════════
// Lookup
// ═══════════════════════════════════════════════════════════

/// Resolve a patient from the token encoded in their QR code.
pub fn lookup_by_token(conn: &Connection, token: &str) -> Result<Patient, GatewayError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(GatewayError::NotFound);
    }
    PatientRepo::new(conn)
        .find_by_qr_token(token)?
        .ok_or(GatewayError::NotFound)
}

/// Resolve a patient from a stored fingerprint hash. The oldest match wins.
pub fn lookup_by_biometric_hash(conn: &Connection, hash: &str) -> Result<Patient, GatewayError> {
    let hash = hash.trim();
    if hash.is_empty() {
        return Err(GatewayError::NotFound);
    }
    PatientRepo::new(conn)
        .find_by_fingerprint(hash)?
        .ok_or(GatewayError::NotFound)
}

/// SVG bytes of the patient's QR code. Re-rendered from the token when
/// the stored artifact is missing.
pub fn qr_artifact(
    conn: &Connection,
    config: &AppConfig,
    patient_id: &Uuid,
) -> Result<Vec<u8>, GatewayError> {
    let patient = get_patient(conn, patient_id)?;
    if let Some(reference) = patient.qr_code_path.as_deref() {
        match qr::read_artifact(&config.media_dir, reference) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => tracing::warn!(error = %e, patient_id = %patient.id, "QR artifact unreadable, re-rendering"),
        }
    }
    Ok(qr::render_svg(&patient.qr_token)?.into_bytes())
}

// ═══════════════════════════════════════════════════════════
// Directory
// ═══════════════════════════════════════════════════════════

pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, GatewayError> {
    Ok(PatientRepo::new(conn).list(filter)?)
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Patient, GatewayError> {
    PatientRepo::new(conn).get(id)?.ok_or(GatewayError::NotFound)
}

/// Partial update. The QR token and owning identity never change.
pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    changes: &PatientFields,
) -> Result<Patient, GatewayError> {
    let repo = PatientRepo::new(conn);
    let mut patient = repo.get(id)?.ok_or(GatewayError::NotFound)?;

    let mut errors = ValidationErrors::new();
    errors.patch_text("first_name", &mut patient.first_name, changes.first_name.as_deref(), true);
    errors.patch_text("last_name", &mut patient.last_name, changes.last_name.as_deref(), true);
    errors.patch_text("blood_type", &mut patient.blood_type, changes.blood_type.as_deref(), false);
    errors.patch_text("address", &mut patient.address, changes.address.as_deref(), false);
    errors.patch_text("phone_number", &mut patient.phone_number, changes.phone_number.as_deref(), true);
    errors.patch_text(
        "emergency_contact",
        &mut patient.emergency_contact,
        changes.emergency_contact.as_deref(),
        true,
    );
    errors.patch_text(
        "emergency_phone",
        &mut patient.emergency_phone,
        changes.emergency_phone.as_deref(),
        true,
    );
    if let Some(raw) = changes.date_of_birth.as_deref() {
        if let Some(dob) = errors.parse_date("date_of_birth", raw) {
            patient.date_of_birth = dob;
        }
    }
    if let Some(raw) = changes.gender.as_deref() {
        if let Some(gender) = errors.parse_choice::<Gender>("gender", raw) {
            patient.gender = gender;
        }
    }
    if let Some(hash) = &changes.fingerprint_hash {
        patient.fingerprint_hash = Some(hash.clone());
    }
    errors.into_result().map_err(GatewayError::Validation)?;

    patient.updated_at = Utc::now();
    repo.update(&patient)?;
    // Re-read so a blank fingerprint comes back as unset.
    get_patient(conn, id)
}

/// Delete a patient (cascading to records and appointments) and its QR artifact.
pub fn delete_patient(conn: &Connection, config: &AppConfig, id: &Uuid) -> Result<(), GatewayError> {
    let repo = PatientRepo::new(conn);
    let patient = repo.get(id)?.ok_or(GatewayError::NotFound)?;
    repo.delete(id)?;

    if let Some(reference) = patient.qr_code_path.as_deref() {
        if let Err(e) = qr::remove_artifact(&config.media_dir, reference) {
            tracing::warn!(error = %e, patient_id = %id, "Failed to remove QR artifact");
        }
    }
    tracing::info!(patient_id = %id, "Patient deleted");
    Ok(())
}
