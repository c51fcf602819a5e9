use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::Session;

/// Persistence for issued session credentials, keyed by token hash.
pub struct SessionRepo<'c> {
    conn: &'c Connection,
}

impl<'c> SessionRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, session: &Session) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO sessions (access_hash, refresh_hash, identity_id,
             access_expires_at, refresh_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.access_hash.as_slice(),
                session.refresh_hash.as_slice(),
                session.identity_id.to_string(),
                ts_to_sql(&session.access_expires_at),
                ts_to_sql(&session.refresh_expires_at),
                ts_to_sql(&session.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_access_hash(&self, hash: &[u8; 32]) -> Result<Option<Session>, DatabaseError> {
        self.find_where("access_hash", hash)
    }

    pub fn find_by_refresh_hash(&self, hash: &[u8; 32]) -> Result<Option<Session>, DatabaseError> {
        self.find_where("refresh_hash", hash)
    }

    /// Swap in a new access token for the session owning `refresh_hash`.
    pub fn rotate_access(
        &self,
        refresh_hash: &[u8; 32],
        new_access_hash: &[u8; 32],
        access_expires_at: &DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE sessions SET access_hash = ?2, access_expires_at = ?3 WHERE refresh_hash = ?1",
            params![
                refresh_hash.as_slice(),
                new_access_hash.as_slice(),
                ts_to_sql(access_expires_at),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("session", "refresh token"));
        }
        Ok(())
    }

    pub fn delete_for_identity(&self, identity_id: &Uuid) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute(
            "DELETE FROM sessions WHERE identity_id = ?1",
            params![identity_id.to_string()],
        )?)
    }

    /// Drop sessions whose refresh token has lapsed.
    pub fn prune_expired(&self, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute(
            "DELETE FROM sessions WHERE refresh_expires_at < ?1",
            params![ts_to_sql(now)],
        )?)
    }

    fn find_where(&self, column: &str, hash: &[u8; 32]) -> Result<Option<Session>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT access_hash, refresh_hash, identity_id, access_expires_at,
                     refresh_expires_at, created_at FROM sessions WHERE {column} = ?1"
                ),
                params![hash.as_slice()],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((access, refresh, identity_id, access_exp, refresh_exp, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Session {
            access_hash: hash_from_blob("sessions.access_hash", access)?,
            refresh_hash: hash_from_blob("sessions.refresh_hash", refresh)?,
            identity_id: uuid_from_sql("sessions.identity_id", &identity_id)?,
            access_expires_at: ts_from_sql("sessions.access_expires_at", &access_exp)?,
            refresh_expires_at: ts_from_sql("sessions.refresh_expires_at", &refresh_exp)?,
            created_at: ts_from_sql("sessions.created_at", &created_at)?,
        }))
    }
}

fn hash_from_blob(column: &'static str, blob: Vec<u8>) -> Result<[u8; 32], DatabaseError> {
    blob.try_into().map_err(|b: Vec<u8>| DatabaseError::CorruptValue {
        column,
        value: format!("{} bytes", b.len()),
    })
}
