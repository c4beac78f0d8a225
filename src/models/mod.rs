//! Core data models for the catalog service.
//!
//! Entities map to SQLite rows via `sqlx::FromRow` and serialize as JSON via
//! `serde`. Request payloads carry `validator` rules and are checked before
//! they reach any service.

pub mod featured;
pub mod hero;
pub mod privacy_policy;
pub mod product;

use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Rejects strings that are empty once trimmed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("must be a non-empty string"));
        return Err(err);
    }
    Ok(())
}

/// Deserializes a field that is present in the payload as `Some`, even when
/// its value is `null`. Combined with `#[serde(default)]`, an absent field
/// stays `None`.
pub(crate) fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Builds a `ValidationError` carrying a human-readable message.
pub(crate) fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Flattens `validator` output into `field: message` lines, sorted so the
/// response is stable.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect_messages(errors, "", &mut out);
    out.sort();
    out
}

fn collect_messages(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let name = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    match &err.message {
                        Some(message) => out.push(format!("{name}: {message}")),
                        None => out.push(format!("{name}: invalid value ({})", err.code)),
                    }
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, &name, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_messages(inner, &format!("{name}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_are_rejected() {
        assert!(not_blank("Mic").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn messages_are_prefixed_with_field_names() {
        let mut errors = ValidationErrors::new();
        errors.add("price", field_error("range", "must be non-negative"));
        errors.add("id", field_error("immutable", "cannot be updated"));

        assert_eq!(
            validation_messages(&errors),
            vec![
                "id: cannot be updated".to_string(),
                "price: must be non-negative".to_string()
            ]
        );
    }
}
