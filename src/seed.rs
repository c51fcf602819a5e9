//! Default services and staff accounts for a fresh installation.
//!
//! Safe to run repeatedly: existing services (by name) and accounts
//! (by username) are left untouched.

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::repository::{IdentityRepo, Repository, ServiceRepo, StaffRepo};
use crate::identity::{self, IdentityError, NewAccount};
use crate::models::{Service, Staff};

const DEFAULT_SERVICES: &[(&str, &str, &str)] = &[
    ("Emergency", "Emergency department", "Building A, ground floor"),
    ("Radiology", "Radiology and imaging", "Building B, 1st floor"),
    ("Cardiology", "Cardiology department", "Building C, 2nd floor"),
    ("Pediatrics", "Pediatrics department", "Building D, ground floor"),
    ("Laboratory", "Medical analysis laboratory", "Building E, basement"),
];

struct SeedAccount<'a> {
    username: &'static str,
    email: &'static str,
    password: &'a str,
    first_name: &'static str,
    last_name: &'static str,
    role: &'static str,
    can_access_all: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub services_created: usize,
    pub accounts_created: usize,
}

pub fn seed(conn: &Connection, config: &AppConfig) -> Result<SeedReport, IdentityError> {
    let tx = conn.unchecked_transaction()?;
    let mut report = SeedReport::default();

    let services = ServiceRepo::new(&tx);
    for (name, description, location) in DEFAULT_SERVICES {
        if services.find_by_name(name)?.is_some() {
            continue;
        }
        services.insert(&Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            location: location.to_string(),
        })?;
        report.services_created += 1;
    }

    let accounts = [
        SeedAccount {
            username: "admin",
            email: "admin@hospital.local",
            password: &config.seed_admin_password,
            first_name: "Hospital",
            last_name: "Administrator",
            role: "Administrator",
            can_access_all: true,
        },
        SeedAccount {
            username: "agent",
            email: "agent@hospital.local",
            password: &config.seed_agent_password,
            first_name: "Agent",
            last_name: "Administrative",
            role: "Reception agent",
            can_access_all: false,
        },
    ];
    for account in &accounts {
        if seed_account(&tx, config, account)? {
            report.accounts_created += 1;
        }
    }

    tx.commit()?;
    tracing::info!(
        services = report.services_created,
        accounts = report.accounts_created,
        "Seed data applied"
    );
    Ok(report)
}

/// Returns `true` when the account was created.
fn seed_account(
    conn: &Connection,
    config: &AppConfig,
    account: &SeedAccount<'_>,
) -> Result<bool, IdentityError> {
    if IdentityRepo::new(conn).username_exists(account.username)? {
        return Ok(false);
    }

    let identity = identity::insert_account(
        conn,
        &NewAccount {
            username: Some(account.username.into()),
            password: Some(account.password.into()),
            email: Some(account.email.into()),
            first_name: Some(account.first_name.into()),
            last_name: Some(account.last_name.into()),
        },
        config.pbkdf2_iterations,
    )?;
    StaffRepo::new(conn).insert(&Staff {
        id: Uuid::new_v4(),
        identity_id: identity.id,
        first_name: account.first_name.into(),
        last_name: account.last_name.into(),
        role: account.role.into(),
        department: "Administration".into(),
        can_access_all: account.can_access_all,
        approved: true,
    })?;
    Ok(true)
}
