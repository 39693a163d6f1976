pub mod advice;
pub mod audio;
pub mod auth;
pub mod materials;
pub mod progress;
pub mod questions;
pub mod quizzes;
pub mod uploads;

use crate::error::{ApiError, Result};

/// Trimmed value of a required text field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

/// Trimmed value of an optional text field; blank counts as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an optional enum-valued field, rejecting unknown values.
pub(crate) fn parse_enum<T>(
    value: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid {field}: {raw}"))),
    }
}
