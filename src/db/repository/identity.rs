use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::Identity;

const IDENTITY_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, created_at";

pub struct IdentityRepo<'c> {
    conn: &'c Connection,
}

impl<'c> IdentityRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<Identity>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = ?1"),
                params![username],
                identity_row,
            )
            .optional()?;
        row.map(identity_from_row).transpose()
    }

    pub fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM identities WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl Repository<Identity, ()> for IdentityRepo<'_> {
    fn insert(&self, identity: &Identity) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            "INSERT INTO identities (id, username, email, password_hash, first_name, last_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                identity.id.to_string(),
                identity.username,
                identity.email,
                identity.password_hash,
                identity.first_name,
                identity.last_name,
                ts_to_sql(&identity.created_at),
            ],
        )?;
        Ok(identity.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Identity>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = ?1"),
                params![id.to_string()],
                identity_row,
            )
            .optional()?;
        row.map(identity_from_row).transpose()
    }

    fn update(&self, identity: &Identity) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE identities SET email = ?2, password_hash = ?3, first_name = ?4, last_name = ?5
             WHERE id = ?1",
            params![
                identity.id.to_string(),
                identity.email,
                identity.password_hash,
                identity.first_name,
                identity.last_name,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("identity", identity.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("identity", id));
        }
        Ok(())
    }

    fn list(&self, _filter: &()) -> Result<Vec<Identity>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY username"))?;
        let rows = stmt.query_map([], identity_row)?;

        let mut identities = Vec::new();
        for row in rows {
            identities.push(identity_from_row(row?)?);
        }
        Ok(identities)
    }
}

// Internal row type for Identity mapping
struct IdentityRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    created_at: String,
}

fn identity_row(row: &rusqlite::Row<'_>) -> Result<IdentityRow, rusqlite::Error> {
    Ok(IdentityRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn identity_from_row(row: IdentityRow) -> Result<Identity, DatabaseError> {
    Ok(Identity {
        id: uuid_from_sql("identities.id", &row.id)?,
        username: row.username,
        email: row.email,
        password_hash: row.password_hash,
        first_name: row.first_name,
        last_name: row.last_name,
        created_at: ts_from_sql("identities.created_at", &row.created_at)?,
    })
}
