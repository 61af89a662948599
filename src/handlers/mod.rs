pub mod admin;
pub mod auth;
pub mod courses;
pub mod extract;
pub mod teacher;
pub mod user;
pub mod videos;

use crate::error::AppError;

/// Trimmed, non-empty value of a required request field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

/// Trimmed value of an optional text field; blank becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Numeric query-string value; blank or unparsable input counts as absent.
pub(crate) fn query_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

pub(crate) fn valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    matches!(
        (parts.next(), parts.next()),
        (Some(local), Some(domain)) if !local.is_empty() && !domain.is_empty()
    )
}
