use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub id: Uuid,
    pub medical_record_id: Uuid,
    pub test_name: String,
    pub test_date: DateTime<Utc>,
    pub result: String,
    pub file_path: Option<String>,
    pub normal_range: String,
}
