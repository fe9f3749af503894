//! The remote index service capability.
//!
//! [`RemoteIndexService`] is the sole external boundary of the engine. A
//! concrete implementation owns the wire transport (HTTP, auth, request
//! serialization); the engine only sees typed results and [`ServiceError`]s.
//!
//! The service owns the authoritative schema and document state. The engine
//! holds transient copies fetched per operation and never caches them.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{
    BatchOperation, BatchResult, ContinuationToken, Document, IndexSchema, ItemResult,
    SearchRequest, SearchResponse, SuggestParams, VersionToken,
};

/// Result type alias for service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Kind of resource a not-found failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A search index.
    Index,
    /// A document addressed by key.
    Document,
    /// A suggester on an index.
    Suggester,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "Index"),
            Self::Document => write!(f, "Document"),
            Self::Suggester => write!(f, "Suggester"),
        }
    }
}

/// Typed failures raised by a [`RemoteIndexService`].
///
/// The split that matters to the engine is transient vs. everything else:
/// only [`ServiceError::is_transient`] failures are retried by batch
/// operations, and only [`ServiceError::VersionConflict`] drives the schema
/// conflict loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// The addressed resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What kind of resource was missing
        kind: ResourceKind,
        /// Its name or key
        name: String,
    },

    /// The resource already exists (e.g. creating an existing index).
    #[error("Conflict: {message}")]
    Conflict {
        /// Service detail
        message: String,
    },

    /// An optimistic-concurrency update carried a stale version token.
    #[error("Version conflict on index '{index}'")]
    VersionConflict {
        /// Index whose schema changed underneath the caller
        index: String,
    },

    /// The request was rejected by schema-level validation.
    #[error("Validation failed: {message}")]
    Validation {
        /// Service detail
        message: String,
    },

    /// Some items of a batch were rejected; the rest were applied.
    #[error("Batch partially failed: {} item(s) rejected", failed.len())]
    PartialFailure {
        /// The rejected items
        failed: Vec<ItemResult>,
    },

    /// A retryable service-level fault (throttling, unavailability).
    #[error("Transient fault ({status}): {message}")]
    Transient {
        /// HTTP-analogous status code
        status: u16,
        /// Service detail
        message: String,
    },

    /// A non-retryable fault (bad request, bad filter, unknown property).
    #[error("Permanent fault ({status}): {message}")]
    Permanent {
        /// HTTP-analogous status code
        status: u16,
        /// Service detail
        message: String,
    },
}

impl ServiceError {
    /// Creates a not-found failure.
    pub fn not_found<S: Into<String>>(kind: ResourceKind, name: S) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a transient fault.
    pub fn transient<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    /// Creates a permanent fault.
    pub fn permanent<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }

    /// Returns `true` for failures a whole-batch retry may fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::PartialFailure { .. })
    }

    /// Returns `true` if the failure is a not-found of any resource kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the failure is a not-found of the given kind.
    pub fn is_not_found_of(&self, expected: ResourceKind) -> bool {
        matches!(self, Self::NotFound { kind, .. } if *kind == expected)
    }

    /// HTTP-analogous status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::VersionConflict { .. } => 412,
            Self::Validation { .. } => 400,
            Self::PartialFailure { .. } => 207,
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
        }
    }

    /// Detail text reported by the service, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Conflict { message }
            | Self::Validation { message }
            | Self::Transient { message, .. }
            | Self::Permanent { message, .. } => Some(message),
            Self::PartialFailure { failed } => {
                failed.iter().find_map(|item| item.message.as_deref())
            }
            Self::NotFound { .. } | Self::VersionConflict { .. } => None,
        }
    }
}

/// Index CRUD, batch-write, search, and suggest over the network.
///
/// Implementations must be cheap to share behind an `Arc`; every engine
/// component receives the same injected handle.
#[async_trait]
pub trait RemoteIndexService: Send + Sync {
    /// Fetch an index schema, including its current version token.
    async fn get_index(&self, name: &str) -> ServiceResult<IndexSchema>;

    /// Create a new index. Fails with `Conflict` if it already exists.
    async fn create_index(&self, schema: &IndexSchema) -> ServiceResult<IndexSchema>;

    /// Create an index or replace its definition.
    ///
    /// When `version` is given, the update only applies if it still matches
    /// the stored version; otherwise the call fails with `VersionConflict`.
    async fn create_or_update_index(
        &self,
        schema: &IndexSchema,
        version: Option<&VersionToken>,
    ) -> ServiceResult<IndexSchema>;

    /// Delete an index and all of its documents.
    async fn delete_index(&self, name: &str) -> ServiceResult<()>;

    /// Check whether an index exists.
    async fn index_exists(&self, name: &str) -> ServiceResult<bool>;

    /// Submit one batch of document actions.
    async fn submit_batch(&self, index: &str, batch: &BatchOperation)
    -> ServiceResult<BatchResult>;

    /// Fetch a single document by key.
    async fn get_document(&self, index: &str, key: &str) -> ServiceResult<Document>;

    /// Run a query and return its first transport page.
    async fn search(&self, index: &str, request: &SearchRequest) -> ServiceResult<SearchResponse>;

    /// Fetch the next transport page of an earlier query.
    async fn continue_search(
        &self,
        index: &str,
        token: &ContinuationToken,
    ) -> ServiceResult<SearchResponse>;

    /// Return completion candidates from a named suggester.
    async fn suggest(
        &self,
        index: &str,
        suggester: &str,
        prefix: &str,
        params: &SuggestParams,
    ) -> ServiceResult<Vec<Document>>;

    /// Get the service name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
