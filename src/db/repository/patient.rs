use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{date_from_sql, date_to_sql, ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::Gender;
use crate::models::{Patient, PatientFilter};

const PATIENT_COLUMNS: &str = "id, identity_id, qr_token, first_name, last_name, date_of_birth,
     gender, blood_type, address, phone_number, emergency_contact, emergency_phone,
     fingerprint_hash, qr_code_path, created_at, updated_at";

pub struct PatientRepo<'c> {
    conn: &'c Connection,
}

impl<'c> PatientRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_qr_token(&self, token: &str) -> Result<Option<Patient>, DatabaseError> {
        self.find_one("qr_token = ?1", token)
    }

    /// Oldest patient holding `hash`. Blank hashes are never stored, so they never match.
    pub fn find_by_fingerprint(&self, hash: &str) -> Result<Option<Patient>, DatabaseError> {
        self.find_one("fingerprint_hash = ?1 ORDER BY created_at, rowid LIMIT 1", hash)
    }

    pub fn find_by_identity(&self, identity_id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
        self.find_one("identity_id = ?1", &identity_id.to_string())
    }

    pub fn exists(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn find_one(&self, clause: &str, value: &str) -> Result<Option<Patient>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE {clause}"),
                params![value],
                patient_row,
            )
            .optional()?;
        row.map(patient_from_row).transpose()
    }
}

impl Repository<Patient, PatientFilter> for PatientRepo<'_> {
    fn insert(&self, patient: &Patient) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            &format!(
                "INSERT INTO patients ({PATIENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                patient.id.to_string(),
                patient.identity_id.to_string(),
                patient.qr_token,
                patient.first_name,
                patient.last_name,
                date_to_sql(&patient.date_of_birth),
                patient.gender.as_str(),
                patient.blood_type,
                patient.address,
                patient.phone_number,
                patient.emergency_contact,
                patient.emergency_phone,
                normalized_fingerprint(&patient.fingerprint_hash),
                patient.qr_code_path,
                ts_to_sql(&patient.created_at),
                ts_to_sql(&patient.updated_at),
            ],
        )?;
        Ok(patient.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
        self.find_one("id = ?1", &id.to_string())
    }

    /// Updates demographic fields. `qr_token`, `identity_id` and
    /// `created_at` are never rewritten.
    fn update(&self, patient: &Patient) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE patients SET first_name = ?2, last_name = ?3, date_of_birth = ?4,
             gender = ?5, blood_type = ?6, address = ?7, phone_number = ?8,
             emergency_contact = ?9, emergency_phone = ?10, fingerprint_hash = ?11,
             qr_code_path = ?12, updated_at = ?13
             WHERE id = ?1",
            params![
                patient.id.to_string(),
                patient.first_name,
                patient.last_name,
                date_to_sql(&patient.date_of_birth),
                patient.gender.as_str(),
                patient.blood_type,
                patient.address,
                patient.phone_number,
                patient.emergency_contact,
                patient.emergency_phone,
                normalized_fingerprint(&patient.fingerprint_hash),
                patient.qr_code_path,
                ts_to_sql(&patient.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("patient", patient.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("patient", id));
        }
        Ok(())
    }

    fn list(&self, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
        let pattern = filter.name.as_ref().map(|n| format!("%{n}%"));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients
             WHERE ?1 IS NULL
                OR LOWER(first_name || ' ' || last_name) LIKE LOWER(?1)
             ORDER BY last_name, first_name"
        ))?;
        let rows = stmt.query_map(params![pattern], patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(patient_from_row(row?)?);
        }
        Ok(patients)
    }
}

fn normalized_fingerprint(hash: &Option<String>) -> Option<&str> {
    hash.as_deref().map(str::trim).filter(|h| !h.is_empty())
}

// Internal row type for Patient mapping
struct PatientRow {
    id: String,
    identity_id: String,
    qr_token: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: String,
    blood_type: String,
    address: String,
    phone_number: String,
    emergency_contact: String,
    emergency_phone: String,
    fingerprint_hash: Option<String>,
    qr_code_path: Option<String>,
    created_at: String,
    updated_at: String,
}

fn patient_row(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        qr_token: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        date_of_birth: row.get(5)?,
        gender: row.get(6)?,
        blood_type: row.get(7)?,
        address: row.get(8)?,
        phone_number: row.get(9)?,
        emergency_contact: row.get(10)?,
        emergency_phone: row.get(11)?,
        fingerprint_hash: row.get(12)?,
        qr_code_path: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: uuid_from_sql("patients.id", &row.id)?,
        identity_id: uuid_from_sql("patients.identity_id", &row.identity_id)?,
        qr_token: row.qr_token,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: date_from_sql("patients.date_of_birth", &row.date_of_birth)?,
        gender: Gender::from_str(&row.gender)?,
        blood_type: row.blood_type,
        address: row.address,
        phone_number: row.phone_number,
        emergency_contact: row.emergency_contact,
        emergency_phone: row.emergency_phone,
        fingerprint_hash: row.fingerprint_hash,
        qr_code_path: row.qr_code_path,
        created_at: ts_from_sql("patients.created_at", &row.created_at)?,
        updated_at: ts_from_sql("patients.updated_at", &row.updated_at)?,
    })
}
