use std::fmt;

use crate::domain::DurationUnit;

pub const TEXT_FIELD_MAX_LEN: usize = 200;
pub const BUYER_NUMBER_MAX_LEN: usize = 32;
pub const SERIAL_NUMBER_MAX_LEN: usize = 64;
pub const TRANSACTION_CODE_MAX_LEN: usize = 64;
pub const SEARCH_QUERY_MAX_LEN: usize = 100;
pub const MAX_PERIOD_DURATION: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims the ends of a stored value. Interior text is kept as given; control
/// characters are rejected rather than stripped.
pub fn trim_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            "must not contain control characters",
        ));
    }

    Ok(value.to_string())
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Trims a required text field and checks its length.
pub fn required_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<String, ValidationError> {
    let value = trim_text(field, value.unwrap_or_default())?;
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

pub fn validate_price(price: Option<i64>) -> Result<i64, ValidationError> {
    match price {
        None => Err(ValidationError::new("productPrice", "must not be empty")),
        Some(p) if p < 0 => Err(ValidationError::new("productPrice", "must not be negative")),
        Some(p) => Ok(p),
    }
}

/// Checks one optional period block. When `enabled` is false the duration
/// and unit are ignored and `None` is returned.
pub fn validate_period(
    duration_field: &'static str,
    unit_field: &'static str,
    enabled: bool,
    duration: Option<i64>,
    unit: Option<&str>,
) -> Result<Option<(i32, DurationUnit)>, ValidationError> {
    if !enabled {
        return Ok(None);
    }

    let duration = duration.ok_or_else(|| ValidationError::new(duration_field, "must not be empty"))?;
    if duration <= 0 {
        return Err(ValidationError::new(duration_field, "must be a positive integer"));
    }
    if duration > MAX_PERIOD_DURATION {
        return Err(ValidationError::new(
            duration_field,
            format!("must be at most {}", MAX_PERIOD_DURATION),
        ));
    }

    let unit = unit.map(str::trim).unwrap_or_default();
    validate_required(unit_field, unit)?;
    validate_enum(unit_field, unit, &DurationUnit::ALL)?;
    let unit = unit
        .parse::<DurationUnit>()
        .map_err(|e| ValidationError::new(unit_field, e.to_string()))?;

    Ok(Some((duration as i32, unit)))
}

/// Trims and uppercases a transaction code or serial number for lookup.
pub fn normalize_identifier(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = trim_text(field, raw)?.to_uppercase();
    validate_required(field, &value)?;
    validate_max_len(field, &value, SERIAL_NUMBER_MAX_LEN)?;
    Ok(value)
}

pub fn validate_search_query(raw: &str) -> Result<String, ValidationError> {
    let query = sanitize_string(raw);
    validate_required("q", &query)?;
    validate_max_len("q", &query, SEARCH_QUERY_MAX_LEN)?;
    Ok(query)
}
