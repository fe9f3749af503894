//! Classification of service failure detail text.
//!
//! The service reports some validation failures only as free text in the
//! error detail. These helpers turn that text back into typed errors.

use std::sync::LazyLock;

use regex::Regex;
use tessera_core::{Error, ServiceError};

static UNKNOWN_PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bproperty '([^']+)' does not exist").expect("Invalid unknown property regex")
});

static INVALID_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cannot convert the literal|expected type|is not a valid value")
        .expect("Invalid value conversion regex")
});

/// Extract the field named by an "unknown property" detail.
pub fn unknown_property(detail: &str) -> Option<&str> {
    UNKNOWN_PROPERTY_RE
        .captures(detail)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether a detail reports a value that failed type conversion.
pub fn is_invalid_value(detail: &str) -> bool {
    INVALID_VALUE_RE.is_match(detail)
}

/// Classify a failed document mutation on `index`.
///
/// Unknown fields and bad values get their own variants; anything else is
/// reported as a generic indexing failure.
pub fn classify_mutation_error(index: &str, err: ServiceError) -> Error {
    if let Some(detail) = err.detail() {
        if let Some(field) = unknown_property(detail) {
            return Error::UnknownField {
                index: index.to_string(),
                field: field.to_string(),
            };
        }
        if is_invalid_value(detail) {
            return Error::InvalidFieldValue {
                index: index.to_string(),
                message: detail.to_string(),
            };
        }
    }
    Error::Indexing {
        index: index.to_string(),
        source: err,
    }
}

/// Whether a rejected search failed because of its filter expression.
pub fn is_filter_rejection(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Permanent { status: 400, .. } | ServiceError::Validation { .. }
    ) && err
        .detail()
        .is_some_and(|detail| detail.to_ascii_lowercase().contains("filter"))
}
