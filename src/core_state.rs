//! Application state shared by every request handler.
//!
//! Holds the immutable `AppConfig`. Each request opens its own SQLite
//! connection against the configured database file.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{self, DatabaseError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Who performed an audited request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    /// No bearer credential (register, token, health).
    Anonymous,
    /// Authenticated identity.
    Identity(Uuid),
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessSource::Anonymous => f.write_str("anonymous"),
            AccessSource::Identity(id) => write!(f, "identity:{id}"),
        }
    }
}

pub struct CoreState {
    pub config: AppConfig,
    /// Requests audited since startup.
    audited: AtomicU64,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            audited: AtomicU64::new(0),
        }
    }

    /// Create the data and media directories and bring the schema up to date.
    pub fn init_storage(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        std::fs::create_dir_all(self.config.qr_dir())?;
        let conn = self.open_db()?;
        let tables = db::count_tables(&conn)?;
        tracing::info!(
            database = %self.config.database_path.display(),
            tables,
            "Storage ready"
        );
        Ok(())
    }

    /// Open a database connection. Called once per request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.database_path).map_err(CoreError::Database)
    }

    /// Record an API access in the audit log.
    pub fn log_access(&self, source: AccessSource, action: &str, detail: &str) {
        self.audited.fetch_add(1, Ordering::Relaxed);
        tracing::info!(target: "hospital_records::audit", %source, action, detail, "access");
    }

    pub fn audited_requests(&self) -> u64 {
        self.audited.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_storage_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::new(AppConfig::with_data_dir(dir.path().join("data")));
        core.init_storage().unwrap();

        assert!(core.config.database_path.exists());
        assert!(core.config.qr_dir().is_dir());
        let conn = core.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 9);
    }

    #[test]
    fn log_access_counts() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::new(AppConfig::with_data_dir(dir.path().to_path_buf()));
        core.log_access(AccessSource::Anonymous, "GET /health", "status:200");
        core.log_access(AccessSource::Identity(Uuid::nil()), "GET /me", "status:200");
        assert_eq!(core.audited_requests(), 2);
        assert_eq!(
            AccessSource::Identity(Uuid::nil()).to_string(),
            "identity:00000000-0000-0000-0000-000000000000"
        );
    }
}
