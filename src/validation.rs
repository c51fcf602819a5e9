//! Per-field input validation errors.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const REQUIRED: &str = "This field is required.";

/// Field name → messages. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Record `REQUIRED` for `field` when `value` is absent or blank.
    /// Returns the trimmed value otherwise.
    pub fn require<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.add(field, REQUIRED);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn parse_date(&mut self, field: &str, raw: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.add(field, "Date has wrong format. Use YYYY-MM-DD.");
                None
            }
        }
    }

    /// RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` taken as UTC.
    pub fn parse_timestamp(&mut self, field: &str, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        self.add(field, "Datetime has wrong format. Use RFC 3339.");
        None
    }

    pub fn parse_uuid(&mut self, field: &str, raw: &str) -> Option<Uuid> {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.add(field, "Must be a valid UUID.");
                None
            }
        }
    }

    /// Parse one of a fixed set of string values.
    pub fn parse_choice<T: FromStr>(&mut self, field: &str, raw: &str) -> Option<T> {
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.add(field, format!("\"{}\" is not a valid choice.", raw.trim()));
                None
            }
        }
    }

    /// Overwrite `target` when `value` is present. Blank values are
    /// refused for `required` fields.
    pub fn patch_text(&mut self, field: &str, target: &mut String, value: Option<&str>, required: bool) {
        let Some(value) = value else { return };
        let value = value.trim();
        if required && value.is_empty() {
            self.add(field, "This field may not be blank.");
            return;
        }
        *target = value.to_string();
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_flags_blank_values() {
        let mut errors = ValidationErrors::new();
        assert_eq!(errors.require("username", Some("  bob ")), Some("bob"));
        assert_eq!(errors.require("password", Some("   ")), None);
        assert_eq!(errors.require("email", None), None);
        assert!(errors.contains("password"));
        assert!(errors.contains("email"));
        assert!(!errors.contains("username"));
    }

    #[test]
    fn serializes_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("gender", "Not a valid choice.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["gender"][0], "Not a valid choice.");
        assert_eq!(errors.to_string(), "invalid fields: gender");
    }

    #[test]
    fn parses_dates_and_timestamps() {
        let mut errors = ValidationErrors::new();
        assert_eq!(
            errors.parse_date("date_of_birth", "1990-02-28"),
            NaiveDate::from_ymd_opt(1990, 2, 28)
        );
        let ts = errors.parse_timestamp("visit_date", "2024-03-01T10:30:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:30:00+00:00");
        let naive = errors.parse_timestamp("visit_date", "2024-03-01T10:30").unwrap();
        assert_eq!(naive, ts);
        assert!(errors.is_empty());

        assert!(errors.parse_date("date_of_birth", "28/02/1990").is_none());
        assert!(errors.parse_timestamp("visit_date", "yesterday").is_none());
        assert!(errors.contains("date_of_birth"));
        assert!(errors.contains("visit_date"));
    }

    #[test]
    fn patch_text_keeps_absent_and_rejects_blank_required() {
        let mut errors = ValidationErrors::new();
        let mut name = "Awa".to_string();
        errors.patch_text("first_name", &mut name, None, true);
        assert_eq!(name, "Awa");
        errors.patch_text("first_name", &mut name, Some(" "), true);
        assert_eq!(name, "Awa");
        assert!(errors.contains("first_name"));

        let mut address = "Dakar".to_string();
        errors.patch_text("address", &mut address, Some(""), false);
        assert_eq!(address, "");
    }

    #[test]
    fn empty_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
