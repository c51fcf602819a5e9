use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{uuid_from_sql, DatabaseError};
use crate::models::{Service, ServiceFilter};

pub struct ServiceRepo<'c> {
    conn: &'c Connection,
}

impl<'c> ServiceRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn exists(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM services WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Service>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, location FROM services WHERE name = ?1 LIMIT 1",
                params![name],
                service_row,
            )
            .optional()?;
        row.map(service_from_row).transpose()
    }
}

impl Repository<Service, ServiceFilter> for ServiceRepo<'_> {
    fn insert(&self, service: &Service) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            "INSERT INTO services (id, name, description, location) VALUES (?1, ?2, ?3, ?4)",
            params![
                service.id.to_string(),
                service.name,
                service.description,
                service.location,
            ],
        )?;
        Ok(service.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Service>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, location FROM services WHERE id = ?1",
                params![id.to_string()],
                service_row,
            )
            .optional()?;
        row.map(service_from_row).transpose()
    }

    fn update(&self, service: &Service) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE services SET name = ?2, description = ?3, location = ?4 WHERE id = ?1",
            params![
                service.id.to_string(),
                service.name,
                service.description,
                service.location,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("service", service.id));
        }
        Ok(())
    }

    /// Dependent medical records and appointments keep existing with
    /// their service reference cleared (ON DELETE SET NULL).
    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM services WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("service", id));
        }
        Ok(())
    }

    fn list(&self, filter: &ServiceFilter) -> Result<Vec<Service>, DatabaseError> {
        let pattern = filter.name.as_ref().map(|n| format!("%{n}%"));
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, location FROM services
             WHERE ?1 IS NULL OR LOWER(name) LIKE LOWER(?1)
             ORDER BY name",
        )?;
        let rows = stmt.query_map(params![pattern], service_row)?;

        let mut services = Vec::new();
        for row in rows {
            services.push(service_from_row(row?)?);
        }
        Ok(services)
    }
}

fn service_row(row: &rusqlite::Row<'_>) -> Result<(String, String, String, String), rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn service_from_row(
    (id, name, description, location): (String, String, String, String),
) -> Result<Service, DatabaseError> {
    Ok(Service {
        id: uuid_from_sql("services.id", &id)?,
        name,
        description,
        location,
    })
}
