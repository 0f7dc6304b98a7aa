//! Small helpers for schema checks inside `TaskKind::validate`.

use serde_json::Value;

use crate::domain::ValidationError;

/// Non-empty string field.
pub fn require_str<'a>(item: &'a Value, field: &str) -> Result<&'a str, ValidationError> {
    match item.get(field).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

/// String field whose value must be one of `allowed` (compared case-insensitively).
/// Returns the canonical spelling from `allowed`.
pub fn require_one_of(
    item: &Value,
    field: &str,
    allowed: &[&'static str],
) -> Result<&'static str, ValidationError> {
    let value = require_str(item, field)?;
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value))
        .copied()
        .ok_or_else(|| ValidationError::NotAllowed {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Array field of non-empty strings, at least one element.
pub fn require_str_list(item: &Value, field: &str) -> Result<Vec<String>, ValidationError> {
    let values = item
        .get(field)
        .and_then(Value::as_array)
        .filter(|values| !values.is_empty())
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))?;

    values
        .iter()
        .map(|v| match v.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(ValidationError::Malformed(format!(
                "`{field}` must contain non-empty strings"
            ))),
        })
        .collect()
}
