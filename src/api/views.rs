//! Read shapes: related rows nested in place of bare foreign keys.
//!
//! Patients and staff carry their account as `user`. Records and
//! appointments carry the full `patient` and `service`.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{IdentityRepo, PatientRepo, Repository, ServiceRepo};
use crate::db::DatabaseError;
use crate::models::{Appointment, Identity, MedicalRecord, Patient, Service, Staff};

/// Public account fields.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<Identity> for UserSummary {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffView {
    #[serde(flatten)]
    pub staff: Staff,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecordView {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub patient: PatientView,
    pub service: Option<Service>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: PatientView,
    pub service: Option<Service>,
}

/// Resolves related rows for one response. Repeated ids hit the cache.
pub struct ViewLoader<'c> {
    conn: &'c Connection,
    users: HashMap<Uuid, UserSummary>,
    patients: HashMap<Uuid, PatientView>,
    services: HashMap<Uuid, Option<Service>>,
}

impl<'c> ViewLoader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            users: HashMap::new(),
            patients: HashMap::new(),
            services: HashMap::new(),
        }
    }

    fn user(&mut self, identity_id: Uuid) -> Result<UserSummary, DatabaseError> {
        if let Some(user) = self.users.get(&identity_id) {
            return Ok(user.clone());
        }
        let identity = IdentityRepo::new(self.conn)
            .get(&identity_id)?
            .ok_or_else(|| DatabaseError::not_found("identity", identity_id))?;
        let user = UserSummary::from(identity);
        self.users.insert(identity_id, user.clone());
        Ok(user)
    }

    pub fn patient(&mut self, patient: Patient) -> Result<PatientView, DatabaseError> {
        let user = self.user(patient.identity_id)?;
        let view = PatientView { patient, user };
        self.patients.insert(view.patient.id, view.clone());
        Ok(view)
    }

    fn patient_by_id(&mut self, patient_id: Uuid) -> Result<PatientView, DatabaseError> {
        if let Some(view) = self.patients.get(&patient_id) {
            return Ok(view.clone());
        }
        let patient = PatientRepo::new(self.conn)
            .get(&patient_id)?
            .ok_or_else(|| DatabaseError::not_found("patient", patient_id))?;
        self.patient(patient)
    }

    fn service(&mut self, service_id: Option<Uuid>) -> Result<Option<Service>, DatabaseError> {
        let Some(service_id) = service_id else {
            return Ok(None);
        };
        if let Some(service) = self.services.get(&service_id) {
            return Ok(service.clone());
        }
        let service = ServiceRepo::new(self.conn).get(&service_id)?;
        self.services.insert(service_id, service.clone());
        Ok(service)
    }

    pub fn staff(&mut self, staff: Staff) -> Result<StaffView, DatabaseError> {
        let user = self.user(staff.identity_id)?;
        Ok(StaffView { staff, user })
    }

    pub fn record(&mut self, record: MedicalRecord) -> Result<MedicalRecordView, DatabaseError> {
        let patient = self.patient_by_id(record.patient_id)?;
        let service = self.service(record.service_id)?;
        Ok(MedicalRecordView {
            record,
            patient,
            service,
        })
    }

    pub fn appointment(&mut self, appointment: Appointment) -> Result<AppointmentView, DatabaseError> {
        let patient = self.patient_by_id(appointment.patient_id)?;
        let service = self.service(appointment.service_id)?;
        Ok(AppointmentView {
            appointment,
            patient,
            service,
        })
    }

    pub fn patients(&mut self, patients: Vec<Patient>) -> Result<Vec<PatientView>, DatabaseError> {
        patients.into_iter().map(|p| self.patient(p)).collect()
    }

    pub fn staff_members(&mut self, staff: Vec<Staff>) -> Result<Vec<StaffView>, DatabaseError> {
        staff.into_iter().map(|s| self.staff(s)).collect()
    }

    pub fn records(
        &mut self,
        records: Vec<MedicalRecord>,
    ) -> Result<Vec<MedicalRecordView>, DatabaseError> {
        records.into_iter().map(|r| self.record(r)).collect()
    }

    pub fn appointments(
        &mut self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentView>, DatabaseError> {
        appointments.into_iter().map(|a| self.appointment(a)).collect()
    }
}
