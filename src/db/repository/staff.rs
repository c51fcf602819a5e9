use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{uuid_from_sql, DatabaseError};
use crate::models::{Staff, StaffFilter};

const STAFF_COLUMNS: &str =
    "id, identity_id, first_name, last_name, role, department, can_access_all, approved";

pub struct StaffRepo<'c> {
    conn: &'c Connection,
}

impl<'c> StaffRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_identity(&self, identity_id: &Uuid) -> Result<Option<Staff>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE identity_id = ?1"),
                params![identity_id.to_string()],
                staff_row,
            )
            .optional()?;
        row.map(staff_from_row).transpose()
    }
}

impl Repository<Staff, StaffFilter> for StaffRepo<'_> {
    fn insert(&self, staff: &Staff) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            &format!("INSERT INTO staff ({STAFF_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                staff.id.to_string(),
                staff.identity_id.to_string(),
                staff.first_name,
                staff.last_name,
                staff.role,
                staff.department,
                staff.can_access_all,
                staff.approved,
            ],
        )?;
        Ok(staff.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Staff>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?1"),
                params![id.to_string()],
                staff_row,
            )
            .optional()?;
        row.map(staff_from_row).transpose()
    }

    fn update(&self, staff: &Staff) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE staff SET first_name = ?2, last_name = ?3, role = ?4, department = ?5,
             can_access_all = ?6, approved = ?7 WHERE id = ?1",
            params![
                staff.id.to_string(),
                staff.first_name,
                staff.last_name,
                staff.role,
                staff.department,
                staff.can_access_all,
                staff.approved,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("staff", staff.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM staff WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("staff", id));
        }
        Ok(())
    }

    fn list(&self, filter: &StaffFilter) -> Result<Vec<Staff>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff
             WHERE ?1 IS NULL OR department = ?1
             ORDER BY last_name, first_name"
        ))?;
        let rows = stmt.query_map(params![filter.department], staff_row)?;

        let mut staff = Vec::new();
        for row in rows {
            staff.push(staff_from_row(row?)?);
        }
        Ok(staff)
    }
}

struct StaffRow {
    id: String,
    identity_id: String,
    first_name: String,
    last_name: String,
    role: String,
    department: String,
    can_access_all: bool,
    approved: bool,
}

fn staff_row(row: &rusqlite::Row<'_>) -> Result<StaffRow, rusqlite::Error> {
    Ok(StaffRow {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: row.get(4)?,
        department: row.get(5)?,
        can_access_all: row.get(6)?,
        approved: row.get(7)?,
    })
}

fn staff_from_row(row: StaffRow) -> Result<Staff, DatabaseError> {
    Ok(Staff {
        id: uuid_from_sql("staff.id", &row.id)?,
        identity_id: uuid_from_sql("staff.identity_id", &row.identity_id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        role: row.role,
        department: row.department,
        can_access_all: row.can_access_all,
        approved: row.approved,
    })
}
