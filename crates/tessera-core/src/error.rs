//! Error types for Tessera operations.

use crate::service::ServiceError;
use crate::types::BatchKind;

/// Errors surfaced to callers of the Tessera engine.
///
/// Each variant carries enough structure (index, field, status) for the
/// caller to pick a remediation, e.g. adding a missing field and retrying.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A domain or wire type has no counterpart on the other side.
    #[error("Unsupported type: {type_name}")]
    UnsupportedType {
        /// Name of the offending type
        type_name: String,
    },

    /// An index declaration failed client-side validation.
    #[error("Invalid index declaration: {message}")]
    InvalidDeclaration {
        /// What is wrong with the declaration
        message: String,
    },

    /// Creating or updating a whole index schema failed.
    ///
    /// Never retried automatically.
    #[error("Error creating index '{index}': {source}")]
    Schema {
        /// Index being created or updated
        index: String,
        /// Underlying service failure
        #[source]
        source: ServiceError,
    },

    /// A second key field was requested for an index that already has one.
    #[error("Index '{index}' already has key field '{existing}'; cannot add key field '{requested}'")]
    DuplicateKeyField {
        /// Index name
        index: String,
        /// Key field currently defined on the index
        existing: String,
        /// Key field the caller asked for
        requested: String,
    },

    /// The schema conflict loop hit its configured attempt cap.
    #[error("Schema update for index '{index}' kept conflicting after {attempts} attempts")]
    ConflictRetriesExhausted {
        /// Index name
        index: String,
        /// Number of conflicting submissions
        attempts: u32,
    },

    /// A batch kept failing transiently until the retry bound ran out.
    #[error("{operation} batch on index '{index}' exceeded maximum allowable attempts ({attempts})")]
    RetriesExhausted {
        /// Kind of batch that was submitted
        operation: BatchKind,
        /// Index name
        index: String,
        /// Total submissions made (initial attempt plus retries)
        attempts: u32,
        /// Last transient failure observed
        #[source]
        source: ServiceError,
    },

    /// A partial update referenced a field the index does not define.
    #[error("Field '{field}' does not exist on index '{index}'")]
    UnknownField {
        /// Index name
        index: String,
        /// Field reported by the service
        field: String,
    },

    /// A value failed the service's type validation.
    #[error("Invalid field value for index '{index}': {message}")]
    InvalidFieldValue {
        /// Index name
        index: String,
        /// Service detail
        message: String,
    },

    /// A mutation failed for a reason other than an unknown field or bad value.
    #[error("Indexing failed on index '{index}': {source}")]
    Indexing {
        /// Index name
        index: String,
        /// Underlying service failure
        #[source]
        source: ServiceError,
    },

    /// The filter expression was rejected by the service.
    #[error("Invalid filter '{filter}': {message}")]
    InvalidFilter {
        /// Filter as supplied by the caller
        filter: String,
        /// Service detail
        message: String,
    },

    /// The named suggester does not exist on the index.
    #[error("Suggester '{suggester}' does not exist on index '{index}'")]
    UnknownSuggester {
        /// Index name
        index: String,
        /// Suggester name
        suggester: String,
    },

    /// The index does not exist.
    #[error("Index does not exist: {index}")]
    IndexNotFound {
        /// Index name
        index: String,
    },

    /// The index has no key field, so documents cannot be addressed by key.
    #[error("Index '{index}' has no key field")]
    NoKeyField {
        /// Index name
        index: String,
    },

    /// A document lacks a value for the key field.
    #[error("Document is missing key field '{field}'")]
    MissingKey {
        /// Key field name
        field: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// Any other service failure, passed through untouched.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Convenience `Result` type alias for Tessera operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether retrying the same call later may succeed.
    ///
    /// Permanent and validation failures are never retryable; neither is an
    /// exhausted batch, since the bounded retry already happened.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Service(source) => source.is_transient(),
            Error::ConflictRetriesExhausted { .. } => true,
            Error::UnsupportedType { .. }
            | Error::InvalidDeclaration { .. }
            | Error::Schema { .. }
            | Error::DuplicateKeyField { .. }
            | Error::RetriesExhausted { .. }
            | Error::UnknownField { .. }
            | Error::InvalidFieldValue { .. }
            | Error::Indexing { .. }
            | Error::InvalidFilter { .. }
            | Error::UnknownSuggester { .. }
            | Error::IndexNotFound { .. }
            | Error::NoKeyField { .. }
            | Error::MissingKey { .. }
            | Error::Config { .. } => false,
        }
    }

    /// HTTP-analogous status class of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Schema { source, .. }
            | Error::RetriesExhausted { source, .. }
            | Error::Indexing { source, .. }
            | Error::Service(source) => Some(source.status()),
            Error::UnknownField { .. }
            | Error::InvalidFieldValue { .. }
            | Error::InvalidFilter { .. } => Some(400),
            Error::UnknownSuggester { .. } | Error::IndexNotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new declaration validation error.
    pub fn declaration<S: Into<String>>(message: S) -> Self {
        Error::InvalidDeclaration {
            message: message.into(),
        }
    }

    /// Wraps a service failure raised while creating or updating a schema.
    pub fn schema<S: Into<String>>(index: S, source: ServiceError) -> Self {
        Error::Schema {
            index: index.into(),
            source,
        }
    }

    /// Creates an unsupported-type error.
    pub fn unsupported<S: Into<String>>(type_name: S) -> Self {
        Error::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
