use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::Repository;
use crate::db::{ts_from_sql, ts_to_sql, uuid_from_sql, DatabaseError};
use crate::models::{TestResult, TestResultFilter};

const RESULT_COLUMNS: &str =
    "id, medical_record_id, test_name, test_date, result, file_path, normal_range";

pub struct TestResultRepo<'c> {
    conn: &'c Connection,
}

impl<'c> TestResultRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Repository<TestResult, TestResultFilter> for TestResultRepo<'_> {
    fn insert(&self, result: &TestResult) -> Result<Uuid, DatabaseError> {
        self.conn.execute(
            &format!("INSERT INTO test_results ({RESULT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                result.id.to_string(),
                result.medical_record_id.to_string(),
                result.test_name,
                ts_to_sql(&result.test_date),
                result.result,
                result.file_path,
                result.normal_range,
            ],
        )?;
        Ok(result.id)
    }

    fn get(&self, id: &Uuid) -> Result<Option<TestResult>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RESULT_COLUMNS} FROM test_results WHERE id = ?1"),
                params![id.to_string()],
                result_row,
            )
            .optional()?;
        row.map(result_from_row).transpose()
    }

    fn update(&self, result: &TestResult) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE test_results SET test_name = ?2, test_date = ?3, result = ?4,
             file_path = ?5, normal_range = ?6, medical_record_id = ?7 WHERE id = ?1",
            params![
                result.id.to_string(),
                result.test_name,
                ts_to_sql(&result.test_date),
                result.result,
                result.file_path,
                result.normal_range,
                result.medical_record_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::not_found("test_result", result.id));
        }
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM test_results WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(DatabaseError::not_found("test_result", id));
        }
        Ok(())
    }

    fn list(&self, filter: &TestResultFilter) -> Result<Vec<TestResult>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM test_results
             WHERE ?1 IS NULL OR medical_record_id = ?1
             ORDER BY test_date DESC"
        ))?;
        let rows = stmt.query_map(
            params![filter.medical_record_id.map(|id| id.to_string())],
            result_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(result_from_row(row?)?);
        }
        Ok(results)
    }
}

struct ResultRow {
    id: String,
    medical_record_id: String,
    test_name: String,
    test_date: String,
    result: String,
    file_path: Option<String>,
    normal_range: String,
}

fn result_row(row: &rusqlite::Row<'_>) -> Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        id: row.get(0)?,
        medical_record_id: row.get(1)?,
        test_name: row.get(2)?,
        test_date: row.get(3)?,
        result: row.get(4)?,
        file_path: row.get(5)?,
        normal_range: row.get(6)?,
    })
}

fn result_from_row(row: ResultRow) -> Result<TestResult, DatabaseError> {
    Ok(TestResult {
        id: uuid_from_sql("test_results.id", &row.id)?,
        medical_record_id: uuid_from_sql("test_results.medical_record_id", &row.medical_record_id)?,
        test_name: row.test_name,
        test_date: ts_from_sql("test_results.test_date", &row.test_date)?,
        result: row.result,
        file_path: row.file_path,
        normal_range: row.normal_range,
    })
}
