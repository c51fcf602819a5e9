use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, AppointmentFilter};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, service_id, appointment_date, status, notes, created_at";

pub struct AppointmentRepo<'c> {
    conn: &'c Connection,
}

impl<'c> AppointmentRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// All appointments of one patient, in the order they were created.
    pub fn list_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        self.list(&AppointmentFilter {
            patient_id: Some(*patient_id),
            ..Default::default()
        })
    }
}

impl Repository<Appointment, AppointmentFilter> for AppointmentRepo<'_> {
    fn insert(&self, appointment: &Appointment) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            &format!("INSERT INTO appointments ({APPOINTMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                appointment.id.to_string(),
                appointment.patient_id.to_string(),
                appointment.service_id.map(|id| id.to_string()),
                ts_to_sql(&appointment.appointment_date),
                appointment.status.as_str(),
                appointment.notes,
                ts_to_sql(&appointment.created_at),
            ],
        )?;
        Ok(appointment.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
                params![id.to_string()],
                appointment_row,
            )
            .optional()?;
        row.map(appointment_from_row).transpose()
    }

    /// Status is written as given; transitions are not validated.
    fn update(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE appointments SET service_id = ?2, appointment_date = ?3, status = ?4, notes = ?5,
             patient_id = ?6
             WHERE id = ?1",
            params![
                appointment.id.to_string(),
                appointment.service_id.map(|id| id.to_string()),
                ts_to_sql(&appointment.appointment_date),
                appointment.status.as_str(),
                appointment.notes,
                appointment.patient_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("appointment", appointment.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("appointment", id));
        }
        Ok(())
    }

    /// Creation order; rowid breaks ties between identical timestamps.
    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE (?1 IS NULL OR patient_id = ?1)
               AND (?2 IS NULL OR service_id = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.patient_id.map(|id| id.to_string()),
                filter.service_id.map(|id| id.to_string()),
                filter.status.map(|s| s.as_str()),
            ],
            appointment_row,
        )?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(appointment_from_row(row?)?);
        }
        Ok(appointments)
    }
}

struct AppointmentRow {
    id: String,
    patient_id: String,
    service_id: Option<String>,
    appointment_date: String,
    status: String,
    notes: String,
    created_at: String,
}

fn appointment_row(row: &rusqlite::Row<'_>) -> Result<AppointmentRow, rusqlite::Error> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        service_id: row.get(2)?,
        appointment_date: row.get(3)?,
        status: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: uuid_from_sql("appointments.id", &row.id)?,
        patient_id: uuid_from_sql("appointments.patient_id", &row.patient_id)?,
        service_id: row
            .service_id
            .map(|s| uuid_from_sql("appointments.service_id", &s))
            .transpose()?,
        appointment_date: ts_from_sql("appointments.appointment_date", &row.appointment_date)?,
        status: AppointmentStatus::from_str(&row.status)?,
        notes: row.notes,
        created_at: ts_from_sql("appointments.created_at", &row.created_at)?,
    })
}
