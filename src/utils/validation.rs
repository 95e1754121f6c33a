//! Validation helpers
//!
//! Timestamp parsing and required-field collection for request DTOs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::utils::errors::AppError;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse an RFC 3339 timestamp, a naive ISO-8601 datetime (read as UTC) or a
/// bare date (midnight UTC)
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(AppError::Validation(format!(
        "{} must be an ISO-8601 timestamp, got '{}'",
        field, value
    )))
}

pub fn parse_uuid(field: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::Validation(format!("{} must be a valid id, got '{}'", field, value)))
}

/// Collects the names of absent required fields
#[derive(Debug, Default)]
pub struct RequiredFields {
    missing: Vec<String>,
}

impl RequiredFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<T>(&mut self, name: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.missing.push(name.to_string());
        }
        self
    }

    /// Blank strings count as missing
    pub fn check_text(&mut self, name: &str, value: &Option<String>) -> &mut Self {
        if value.as_deref().map(str::trim).map_or(true, str::is_empty) {
            self.missing.push(name.to_string());
        }
        self
    }

    pub fn validation_result(&self) -> Result<(), AppError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Missing required fields: {}",
                self.missing.join(", ")
            )))
        }
    }

    pub fn missing_fields_result(&self) -> Result<(), AppError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(self.missing.clone()))
        }
    }
}
