//! Identity store: accounts, staff roles and session credentials.
//!
//! Accounts are created with a salted PBKDF2 hash. Sessions pair a
//! short-lived access token with a longer-lived refresh token; only
//! their SHA-256 digests reach the database.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Caller;
use crate::config::AppConfig;
use crate::crypto::{self, CryptoError};
use crate::db::repository::{IdentityRepo, Repository, SessionRepo, StaffRepo};
use crate::db::DatabaseError;
use crate::models::{Identity, Patient, Session, Staff, StaffFilter};
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("A user with that username already exists")]
    DuplicateIdentity,
    #[error("No active account found with the given credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Identity not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<rusqlite::Error> for IdentityError {
    fn from(err: rusqlite::Error) -> Self {
        IdentityError::Database(err.into())
    }
}

// ═══════════════════════════════════════════════════════════
// Requests & credentials
// ═══════════════════════════════════════════════════════════

/// Account fields shared by `/register` and patient creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// `POST /register` body. A `role` also creates a Staff row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    pub role: Option<String>,
    pub department: Option<String>,
}

/// Issued on successful authentication.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCredential {
    pub access: String,
    pub refresh: String,
    pub username: String,
    pub email: String,
}

/// Issued on refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AccessCredential {
    pub access: String,
}

/// Identity plus whichever role rows it holds.
#[derive(Debug, Clone, Serialize)]
pub struct CallerProfile {
    #[serde(flatten)]
    pub identity: Identity,
    pub role: &'static str,
    pub patient: Option<Patient>,
    pub staff: Option<Staff>,
}

// ═══════════════════════════════════════════════════════════
// Accounts
// ═══════════════════════════════════════════════════════════

/// Validate and insert an identity on `conn`. The caller owns the transaction.
pub fn insert_account(
    conn: &Connection,
    account: &NewAccount,
    iterations: u32,
) -> Result<Identity, IdentityError> {
    let mut errors = ValidationErrors::new();
    let username = errors.require("username", account.username.as_deref());
    let password = errors.require("password", account.password.as_deref());
    let email = account.email.as_deref().map(str::trim).unwrap_or_default();
    if !email.is_empty() && !email.contains('@') {
        errors.add("email", "Enter a valid email address.");
    }
    if let Some(username) = username {
        if username.len() > 150 {
            errors.add("username", "Ensure this field has no more than 150 characters.");
        }
    }
    errors.into_result().map_err(IdentityError::Validation)?;

    // Both were checked above.
    let (Some(username), Some(password)) = (username, password) else {
        return Err(IdentityError::Validation(ValidationErrors::new()));
    };

    let repo = IdentityRepo::new(conn);
    if repo.username_exists(username)? {
        return Err(IdentityError::DuplicateIdentity);
    }

    let identity = Identity {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: crypto::hash_password(password, iterations)?,
        first_name: trimmed(&account.first_name),
        last_name: trimmed(&account.last_name),
        created_at: Utc::now(),
    };

    match repo.insert(&identity) {
        Ok(_) => Ok(identity),
        Err(e) if e.is_unique_violation() => Err(IdentityError::DuplicateIdentity),
        Err(e) => Err(e.into()),
    }
}

/// Create an identity, plus a Staff row when `role` is given, atomically.
pub fn register(
    conn: &Connection,
    request: &RegisterRequest,
    iterations: u32,
) -> Result<Identity, IdentityError> {
    let tx = conn.unchecked_transaction()?;
    let identity = insert_account(&tx, &request.account, iterations)?;

    let role = request.role.as_deref().map(str::trim).unwrap_or_default();
    if !role.is_empty() {
        StaffRepo::new(&tx).insert(&Staff {
            id: Uuid::new_v4(),
            identity_id: identity.id,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: role.to_string(),
            department: trimmed(&request.department),
            can_access_all: false,
            approved: false,
        })?;
    }
    tx.commit()?;

    tracing::info!(username = %identity.username, staff = !role.is_empty(), "Identity registered");
    Ok(identity)
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

/// Exchange username + password for a session credential.
///
/// Unknown usernames and wrong passwords produce the same error.
pub fn authenticate(
    conn: &Connection,
    config: &AppConfig,
    username: &str,
    password: &str,
) -> Result<SessionCredential, IdentityError> {
    let Some(identity) = IdentityRepo::new(conn).find_by_username(username.trim())? else {
        tracing::warn!(username, "Login failed: unknown user");
        return Err(IdentityError::InvalidCredentials);
    };

    if !crypto::verify_password(password, &identity.password_hash)? {
        tracing::warn!(username, "Login failed: wrong password");
        return Err(IdentityError::InvalidCredentials);
    }

    let now = Utc::now();
    let sessions = SessionRepo::new(conn);
    sessions.prune_expired(&now)?;

    let access = crypto::generate_token();
    let refresh = crypto::generate_token();
    sessions.insert(&Session {
        access_hash: crypto::hash_token(&access),
        refresh_hash: crypto::hash_token(&refresh),
        identity_id: identity.id,
        access_expires_at: expiry(now, config.access_token_ttl),
        refresh_expires_at: expiry(now, config.refresh_token_ttl),
        created_at: now,
    })?;

    tracing::info!(username = %identity.username, "Session issued");
    Ok(SessionCredential {
        access,
        refresh,
        username: identity.username,
        email: identity.email,
    })
}

/// Issue a fresh access token for a live refresh token.
pub fn refresh(
    conn: &Connection,
    config: &AppConfig,
    refresh_token: &str,
) -> Result<AccessCredential, IdentityError> {
    let refresh_hash = crypto::hash_token(refresh_token);
    let sessions = SessionRepo::new(conn);
    let session = sessions
        .find_by_refresh_hash(&refresh_hash)?
        .ok_or(IdentityError::InvalidCredentials)?;

    let now = Utc::now();
    if now >= session.refresh_expires_at {
        return Err(IdentityError::InvalidCredentials);
    }

    let access = crypto::generate_token();
    sessions.rotate_access(
        &refresh_hash,
        &crypto::hash_token(&access),
        &expiry(now, config.access_token_ttl),
    )?;
    Ok(AccessCredential { access })
}

/// Identity behind a live access token.
pub fn resolve_access_token(conn: &Connection, token: &str) -> Result<Uuid, IdentityError> {
    let session = SessionRepo::new(conn)
        .find_by_access_hash(&crypto::hash_token(token))?
        .ok_or(IdentityError::Unauthorized)?;
    if Utc::now() >= session.access_expires_at {
        return Err(IdentityError::TokenExpired);
    }
    Ok(session.identity_id)
}

/// Identity plus role rows, for `GET /me`.
pub fn caller_profile(conn: &Connection, identity_id: Uuid) -> Result<CallerProfile, IdentityError> {
    let identity = IdentityRepo::new(conn)
        .get(&identity_id)?
        .ok_or(IdentityError::NotFound)?;
    let caller = Caller::resolve(conn, identity_id)?;
    let role = match (&caller.staff, &caller.patient) {
        (Some(_), _) => "staff",
        (None, Some(_)) => "patient",
        (None, None) => "none",
    };
    Ok(CallerProfile {
        identity,
        role,
        patient: caller.patient,
        staff: caller.staff,
    })
}

// ═══════════════════════════════════════════════════════════
// Staff directory
// ═══════════════════════════════════════════════════════════

/// `PATCH /staff/:id` body. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub can_access_all: Option<bool>,
    pub approved: Option<bool>,
}

pub fn list_staff(conn: &Connection, filter: &StaffFilter) -> Result<Vec<Staff>, IdentityError> {
    Ok(StaffRepo::new(conn).list(filter)?)
}

pub fn get_staff(conn: &Connection, id: &Uuid) -> Result<Staff, IdentityError> {
    StaffRepo::new(conn).get(id)?.ok_or(IdentityError::NotFound)
}

pub fn update_staff(
    conn: &Connection,
    id: &Uuid,
    changes: &StaffChanges,
) -> Result<Staff, IdentityError> {
    let repo = StaffRepo::new(conn);
    let mut staff = repo.get(id)?.ok_or(IdentityError::NotFound)?;

    let mut errors = ValidationErrors::new();
    errors.patch_text("first_name", &mut staff.first_name, changes.first_name.as_deref(), false);
    errors.patch_text("last_name", &mut staff.last_name, changes.last_name.as_deref(), false);
    errors.patch_text("role", &mut staff.role, changes.role.as_deref(), true);
    errors.patch_text("department", &mut staff.department, changes.department.as_deref(), false);
    errors.into_result().map_err(IdentityError::Validation)?;
    if let Some(flag) = changes.can_access_all {
        staff.can_access_all = flag;
    }
    if let Some(flag) = changes.approved {
        staff.approved = flag;
    }

    repo.update(&staff)?;
    tracing::info!(
        staff_id = %staff.id,
        can_access_all = staff.can_access_all,
        approved = staff.approved,
        "Staff updated"
    );
    Ok(staff)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use std::path::PathBuf;

    const FAST: u32 = 1_000;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::with_data_dir(PathBuf::from("/tmp/hospital-test"));
        config.pbkdf2_iterations = FAST;
        config
    }

    fn account(username: &str, password: &str) -> NewAccount {
        NewAccount {
            username: Some(username.into()),
            password: Some(password.into()),
            email: Some(format!("{username}@hospital.test")),
            ..Default::default()
        }
    }

    fn register_plain(conn: &Connection, username: &str, password: &str) -> Identity {
        let request = RegisterRequest {
            account: account(username, password),
            ..Default::default()
        };
        register(conn, &request, FAST).unwrap()
    }

    #[test]
    fn register_then_authenticate() {
        let conn = open_memory_database().unwrap();
        let identity = register_plain(&conn, "aminata", "pass1234");
        assert_ne!(identity.password_hash, "pass1234");

        let cred = authenticate(&conn, &test_config(), "aminata", "pass1234").unwrap();
        assert_eq!(cred.username, "aminata");
        assert_eq!(cred.email, "aminata@hospital.test");
        assert_ne!(cred.access, cred.refresh);
        assert_eq!(resolve_access_token(&conn, &cred.access).unwrap(), identity.id);
    }

    #[test]
    fn duplicate_username_rejected() {
        let conn = open_memory_database().unwrap();
        register_plain(&conn, "aminata", "pass1234");
        let request = RegisterRequest {
            account: account("aminata", "other"),
            ..Default::default()
        };
        assert!(matches!(
            register(&conn, &request, FAST),
            Err(IdentityError::DuplicateIdentity)
        ));
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let conn = open_memory_database().unwrap();
        let request = RegisterRequest::default();
        match register(&conn, &request, FAST) {
            Err(IdentityError::Validation(errors)) => {
                assert!(errors.contains("username"));
                assert!(errors.contains("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn role_creates_staff_row() {
        let conn = open_memory_database().unwrap();
        let request = RegisterRequest {
            account: NewAccount {
                first_name: Some("Ibrahima".into()),
                last_name: Some("Fall".into()),
                ..account("ifall", "pw")
            },
            role: Some("doctor".into()),
            department: Some("Cardiology".into()),
        };
        let identity = register(&conn, &request, FAST).unwrap();
        let staff = StaffRepo::new(&conn).find_by_identity(&identity.id).unwrap().unwrap();
        assert_eq!(staff.role, "doctor");
        assert_eq!(staff.department, "Cardiology");
        assert_eq!(staff.first_name, "Ibrahima");
        assert!(!staff.can_access_all);

        let profile = caller_profile(&conn, identity.id).unwrap();
        assert_eq!(profile.role, "staff");
    }

    #[test]
    fn self_registered_role_needs_approval_to_write() {
        use crate::access::{check_clinical_write, WritePolicy};

        let conn = open_memory_database().unwrap();
        let request = RegisterRequest {
            account: account("walkin", "pw"),
            role: Some("anything".into()),
            department: None,
        };
        let identity = register(&conn, &request, FAST).unwrap();
        let staff = StaffRepo::new(&conn).find_by_identity(&identity.id).unwrap().unwrap();
        assert!(!staff.approved);

        let caller = Caller::resolve(&conn, identity.id).unwrap();
        assert!(!check_clinical_write(WritePolicy::StaffOnly, &caller).allowed);

        let changes = StaffChanges {
            approved: Some(true),
            ..Default::default()
        };
        assert!(update_staff(&conn, &staff.id, &changes).unwrap().approved);
        let caller = Caller::resolve(&conn, identity.id).unwrap();
        assert!(check_clinical_write(WritePolicy::StaffOnly, &caller).allowed);
    }

    #[test]
    fn no_role_means_no_staff_row() {
        let conn = open_memory_database().unwrap();
        let identity = register_plain(&conn, "plain", "pw");
        assert!(StaffRepo::new(&conn).find_by_identity(&identity.id).unwrap().is_none());
        assert_eq!(caller_profile(&conn, identity.id).unwrap().role, "none");
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let conn = open_memory_database().unwrap();
        register_plain(&conn, "aminata", "pass1234");
        let config = test_config();
        let wrong = authenticate(&conn, &config, "aminata", "nope").unwrap_err();
        let unknown = authenticate(&conn, &config, "ghost", "nope").unwrap_err();
        assert!(matches!(wrong, IdentityError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn refresh_issues_working_access_token() {
        let conn = open_memory_database().unwrap();
        let identity = register_plain(&conn, "aminata", "pass1234");
        let config = test_config();
        let cred = authenticate(&conn, &config, "aminata", "pass1234").unwrap();

        let renewed = refresh(&conn, &config, &cred.refresh).unwrap();
        assert_ne!(renewed.access, cred.access);
        assert_eq!(resolve_access_token(&conn, &renewed.access).unwrap(), identity.id);
        // The previous access token was replaced.
        assert!(matches!(
            resolve_access_token(&conn, &cred.access),
            Err(IdentityError::Unauthorized)
        ));
    }

    #[test]
    fn unknown_refresh_token_rejected() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            refresh(&conn, &test_config(), "bogus"),
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[test]
    fn expired_access_token_rejected() {
        let conn = open_memory_database().unwrap();
        register_plain(&conn, "aminata", "pass1234");
        let mut config = test_config();
        config.access_token_ttl = Duration::ZERO;
        let cred = authenticate(&conn, &config, "aminata", "pass1234").unwrap();
        assert!(matches!(
            resolve_access_token(&conn, &cred.access),
            Err(IdentityError::TokenExpired)
        ));
    }

    #[test]
    fn expired_refresh_token_rejected() {
        let conn = open_memory_database().unwrap();
        register_plain(&conn, "aminata", "pass1234");
        let mut config = test_config();
        config.refresh_token_ttl = Duration::ZERO;
        let cred = authenticate(&conn, &config, "aminata", "pass1234").unwrap();
        assert!(matches!(
            refresh(&conn, &config, &cred.refresh),
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[test]
    fn staff_update_is_partial() {
        let conn = open_memory_database().unwrap();
        let request = RegisterRequest {
            account: account("nurse", "pw"),
            role: Some("nurse".into()),
            department: Some("Pediatrics".into()),
        };
        let identity = register(&conn, &request, FAST).unwrap();
        let staff = StaffRepo::new(&conn).find_by_identity(&identity.id).unwrap().unwrap();

        let updated = update_staff(
            &conn,
            &staff.id,
            &StaffChanges {
                can_access_all: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(updated.can_access_all);
        assert_eq!(updated.department, "Pediatrics");
        assert_eq!(get_staff(&conn, &staff.id).unwrap().role, "nurse");

        let filter = StaffFilter {
            department: Some("Pediatrics".into()),
        };
        assert_eq!(list_staff(&conn, &filter).unwrap().len(), 1);

        let blank_role = StaffChanges {
            role: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_staff(&conn, &staff.id, &blank_role),
            Err(IdentityError::Validation(_))
        ));
        assert!(matches!(
            get_staff(&conn, &Uuid::new_v4()),
            Err(IdentityError::NotFound)
        ));
    }

    #[test]
    fn unknown_access_token_is_unauthorized() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            resolve_access_token(&conn, "nope"),
            Err(IdentityError::Unauthorized)
        ));
    }
}
