//! Access-control filter for clinical data.
//!
//! Read scope is derived from the caller's role:
//! 1. Staff with `can_access_all` → FULL ACCESS
//! 2. Everyone else → SELF ONLY (records of the patient linked to the caller)
//!
//! Writes are governed by an explicit `WritePolicy` from configuration.
//! Under `StaffOnly` a Staff row counts only once approved. Staff-directory
//! writes always require a full-access caller.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{PatientRepo, StaffRepo};
use crate::db::DatabaseError;
use crate::models::{Patient, RecordScope, Staff};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Who may create or modify medical records, test results and appointments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Any authenticated identity.
    #[default]
    AnyAuthenticated,
    /// Identities holding an approved Staff role.
    StaffOnly,
}

impl WritePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnyAuthenticated => "any_authenticated",
            Self::StaffOnly => "staff_only",
        }
    }
}

impl std::str::FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "any_authenticated" | "any" => Ok(Self::AnyAuthenticated),
            "staff_only" | "staff" => Ok(Self::StaffOnly),
            other => Err(format!("unknown write policy: {other}")),
        }
    }
}

/// The authenticated identity behind a request, with its role rows.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity_id: Uuid,
    pub staff: Option<Staff>,
    pub patient: Option<Patient>,
}

impl Caller {
    /// Load role rows for `identity_id`.
    pub fn resolve(conn: &Connection, identity_id: Uuid) -> Result<Self, DatabaseError> {
        let staff = StaffRepo::new(conn).find_by_identity(&identity_id)?;
        let patient = PatientRepo::new(conn).find_by_identity(&identity_id)?;
        Ok(Self {
            identity_id,
            staff,
            patient,
        })
    }

    pub fn is_staff(&self) -> bool {
        self.staff.is_some()
    }

    /// Staff whose role was approved by full-access staff, or who hold full access.
    pub fn is_approved_staff(&self) -> bool {
        self.staff.as_ref().is_some_and(|s| s.approved || s.can_access_all)
    }

    pub fn has_full_access(&self) -> bool {
        self.staff.as_ref().is_some_and(|s| s.can_access_all)
    }

    /// Row-level scope for medical record reads.
    pub fn scope(&self) -> RecordScope {
        if self.has_full_access() {
            RecordScope::FullAccess
        } else {
            RecordScope::SelfOnly(self.identity_id)
        }
    }
}

/// Why a write was allowed or denied, for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Policy admits every authenticated caller.
    OpenPolicy,
    /// Caller holds an approved Staff role.
    StaffRole,
    /// Caller is staff with `can_access_all`.
    FullAccessStaff,
    /// No matching rule.
    Denied,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// May `caller` create or modify clinical rows under `policy`?
pub fn check_clinical_write(policy: WritePolicy, caller: &Caller) -> AccessDecision {
    match policy {
        WritePolicy::AnyAuthenticated => AccessDecision::allow(AccessReason::OpenPolicy),
        WritePolicy::StaffOnly if caller.is_approved_staff() => {
            AccessDecision::allow(AccessReason::StaffRole)
        }
        WritePolicy::StaffOnly => AccessDecision::deny(),
    }
}

/// May `caller` modify the staff directory?
pub fn check_directory_write(caller: &Caller) -> AccessDecision {
    if caller.has_full_access() {
        AccessDecision::allow(AccessReason::FullAccessStaff)
    } else {
        AccessDecision::deny()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_identity, make_patient};
    use crate::db::repository::Repository;
    use crate::db::sqlite::open_memory_database;

    fn staff_for(conn: &Connection, username: &str, can_access_all: bool) -> Uuid {
        let identity = make_identity(conn, username);
        StaffRepo::new(conn)
            .insert(&Staff {
                id: Uuid::new_v4(),
                identity_id: identity.id,
                first_name: "Fatou".into(),
                last_name: "Sow".into(),
                role: "nurse".into(),
                department: "Emergency".into(),
                can_access_all,
                approved: true,
            })
            .unwrap();
        identity.id
    }

    #[test]
    fn full_access_staff_sees_everything() {
        let conn = open_memory_database().unwrap();
        let id = staff_for(&conn, "admin", true);
        assert_eq!(Caller::resolve(&conn, id).unwrap().scope(), RecordScope::FullAccess);
    }

    #[test]
    fn ordinary_staff_is_self_only() {
        let conn = open_memory_database().unwrap();
        let id = staff_for(&conn, "agent", false);
        assert_eq!(Caller::resolve(&conn, id).unwrap().scope(), RecordScope::SelfOnly(id));
    }

    #[test]
    fn patient_is_self_only() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "ndiaye");
        let caller = Caller::resolve(&conn, patient.identity_id).unwrap();
        assert!(caller.patient.is_some());
        assert!(!caller.is_staff());
        assert_eq!(caller.scope(), RecordScope::SelfOnly(patient.identity_id));
    }

    #[test]
    fn identity_without_role_is_self_only() {
        let conn = open_memory_database().unwrap();
        let identity = make_identity(&conn, "plain");
        let caller = Caller::resolve(&conn, identity.id).unwrap();
        assert!(caller.staff.is_none() && caller.patient.is_none());
        assert_eq!(caller.scope(), RecordScope::SelfOnly(identity.id));
    }

    #[test]
    fn open_policy_admits_patients() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "ba");
        let caller = Caller::resolve(&conn, patient.identity_id).unwrap();
        let decision = check_clinical_write(WritePolicy::AnyAuthenticated, &caller);
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::OpenPolicy);
    }

    #[test]
    fn staff_only_policy() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "ba");
        let nurse = staff_for(&conn, "nurse", false);

        let patient_caller = Caller::resolve(&conn, patient.identity_id).unwrap();
        let decision = check_clinical_write(WritePolicy::StaffOnly, &patient_caller);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Denied);

        let staff_caller = Caller::resolve(&conn, nurse).unwrap();
        let decision = check_clinical_write(WritePolicy::StaffOnly, &staff_caller);
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::StaffRole);
    }

    #[test]
    fn unapproved_staff_cannot_write_under_staff_only() {
        let conn = open_memory_database().unwrap();
        let nurse = staff_for(&conn, "nurse", false);
        let mut row = StaffRepo::new(&conn).find_by_identity(&nurse).unwrap().unwrap();
        row.approved = false;
        StaffRepo::new(&conn).update(&row).unwrap();

        let caller = Caller::resolve(&conn, nurse).unwrap();
        assert!(caller.is_staff());
        assert!(!caller.is_approved_staff());
        assert!(!check_clinical_write(WritePolicy::StaffOnly, &caller).allowed);
        assert!(check_clinical_write(WritePolicy::AnyAuthenticated, &caller).allowed);
    }

    #[test]
    fn directory_writes_need_full_access() {
        let conn = open_memory_database().unwrap();
        let admin = Caller::resolve(&conn, staff_for(&conn, "admin", true)).unwrap();
        let agent = Caller::resolve(&conn, staff_for(&conn, "agent", false)).unwrap();
        assert!(check_directory_write(&admin).allowed);
        assert!(!check_directory_write(&agent).allowed);
    }

    #[test]
    fn write_policy_parses() {
        assert_eq!("staff_only".parse::<WritePolicy>().unwrap(), WritePolicy::StaffOnly);
        assert_eq!(
            "any_authenticated".parse::<WritePolicy>().unwrap(),
            WritePolicy::AnyAuthenticated
        );
        assert!("nobody".parse::<WritePolicy>().is_err());
        assert_eq!(WritePolicy::default(), WritePolicy::AnyAuthenticated);
        assert_eq!(WritePolicy::StaffOnly.as_str(), "staff_only");
    }
}
