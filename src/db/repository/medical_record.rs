use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::VisitType;
use crate::models::{MedicalRecord, MedicalRecordFilter, RecordScope};

const RECORD_COLUMNS: &str = "mr.id, mr.patient_id, mr.service_id, mr.visit_type, mr.visit_date,
     mr.symptoms, mr.diagnosis, mr.treatment, mr.prescription, mr.doctor_name, mr.notes,
     mr.created_at, mr.updated_at";

pub struct MedicalRecordRepo<'c> {
    conn: &'c Connection,
}

impl<'c> MedicalRecordRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Fetch a record only if `scope` allows the caller to see it.
    pub fn get_scoped(
        &self,
        id: &Uuid,
        scope: &RecordScope,
    ) -> Result<Option<MedicalRecord>, DatabaseError> {
        let filter = MedicalRecordFilter::scoped(*scope);
        let (mut sql, mut values) = scoped_select(&filter);
        sql.push_str(" AND mr.id = ?");
        values.push(id.to_string());

        let row = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), record_row)
            .optional()?;
        row.map(record_from_row).transpose()
    }
}

/// Base SELECT with the scope join and filter predicates applied.
/// Always ends in a WHERE clause so callers can append `AND ...`.
fn scoped_select(filter: &MedicalRecordFilter) -> (String, Vec<String>) {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM medical_records mr");
    let mut values = Vec::new();

    match &filter.scope {
        RecordScope::FullAccess => sql.push_str(" WHERE 1 = 1"),
        RecordScope::SelfOnly(identity_id) => {
            sql.push_str(" JOIN patients p ON p.id = mr.patient_id WHERE p.identity_id = ?");
            values.push(identity_id.to_string());
        }
    }
    if let Some(patient_id) = &filter.patient_id {
        sql.push_str(" AND mr.patient_id = ?");
        values.push(patient_id.to_string());
    }
    if let Some(visit_type) = &filter.visit_type {
        sql.push_str(" AND mr.visit_type = ?");
        values.push(visit_type.as_str().to_string());
    }
    (sql, values)
}

impl Repository<MedicalRecord, MedicalRecordFilter> for MedicalRecordRepo<'_> {
    fn insert(&self, record: &MedicalRecord) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            "INSERT INTO medical_records (id, patient_id, service_id, visit_type, visit_date,
             symptoms, diagnosis, treatment, prescription, doctor_name, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id.to_string(),
                record.patient_id.to_string(),
                record.service_id.map(|id| id.to_string()),
                record.visit_type.as_str(),
                ts_to_sql(&record.visit_date),
                record.symptoms,
                record.diagnosis,
                record.treatment,
                record.prescription,
                record.doctor_name,
                record.notes,
                ts_to_sql(&record.created_at),
                ts_to_sql(&record.updated_at),
            ],
        )?;
        Ok(record.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<MedicalRecord>, DatabaseError> {
        self.get_scoped(id, &RecordScope::FullAccess)
    }

    fn update(&self, record: &MedicalRecord) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE medical_records SET service_id = ?2, visit_type = ?3, visit_date = ?4,
             symptoms = ?5, diagnosis = ?6, treatment = ?7, prescription = ?8,
             doctor_name = ?9, notes = ?10, updated_at = ?11, patient_id = ?12
             WHERE id = ?1",
            params![
                record.id.to_string(),
                record.service_id.map(|id| id.to_string()),
                record.visit_type.as_str(),
                ts_to_sql(&record.visit_date),
                record.symptoms,
                record.diagnosis,
                record.treatment,
                record.prescription,
                record.doctor_name,
                record.notes,
                ts_to_sql(&record.updated_at),
                record.patient_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("medical_record", record.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "DELETE FROM medical_records WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("medical_record", id));
        }
        Ok(())
    }

    /// Newest visit first.
    fn list(&self, filter: &MedicalRecordFilter) -> Result<Vec<MedicalRecord>, DatabaseError> {
        let (mut sql, values) = scoped_select(filter);
        sql.push_str(" ORDER BY mr.visit_date DESC, mr.created_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), record_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(record_from_row(row?)?);
        }
        Ok(records)
    }
}

// Internal row type for MedicalRecord mapping
struct RecordRow {
    id: String,
    patient_id: String,
    service_id: Option<String>,
    visit_type: String,
    visit_date: String,
    symptoms: String,
    diagnosis: String,
    treatment: String,
    prescription: String,
    doctor_name: String,
    notes: String,
    created_at: String,
    updated_at: String,
}

fn record_row(row: &rusqlite::Row<'_>) -> Result<RecordRow, rusqlite::Error> {
    Ok(RecordRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        service_id: row.get(2)?,
        visit_type: row.get(3)?,
        visit_date: row.get(4)?,
        symptoms: row.get(5)?,
        diagnosis: row.get(6)?,
        treatment: row.get(7)?,
        prescription: row.get(8)?,
        doctor_name: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<MedicalRecord, DatabaseError> {
    Ok(MedicalRecord {
        id: uuid_from_sql("medical_records.id", &row.id)?,
        patient_id: uuid_from_sql("medical_records.patient_id", &row.patient_id)?,
        service_id: row
            .service_id
            .map(|s| uuid_from_sql("medical_records.service_id", &s))
            .transpose()?,
        visit_type: VisitType::from_str(&row.visit_type)?,
        visit_date: ts_from_sql("medical_records.visit_date", &row.visit_date)?,
        symptoms: row.symptoms,
        diagnosis: row.diagnosis,
        treatment: row.treatment,
        prescription: row.prescription,
        doctor_name: row.doctor_name,
        notes: row.notes,
        created_at: ts_from_sql("medical_records.created_at", &row.created_at)?,
        updated_at: ts_from_sql("medical_records.updated_at", &row.updated_at)?,
    })
}
