//! Tessera Core: shared types, traits, errors, and configuration.
//!
//! This crate provides the foundational types used across all Tessera crates.
//! It has no internal Tessera dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Caller-facing error type and Result alias
//! - [`types`]: Field, schema, document, batch, and search data model
//! - [`mapper`]: Domain type ⇄ wire type mapping
//! - [`service`]: The [`RemoteIndexService`] capability and its typed failures
//! - [`config`]: Engine configuration loaded from TOML

pub mod config;
pub mod error;
pub mod mapper;
pub mod service;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::{EngineConfig, ServiceSettings};
pub use error::{Error, Result};
pub use mapper::{to_domain_type, to_wire_type};
pub use service::{RemoteIndexService, ResourceKind, ServiceError, ServiceResult};
pub use types::{
    BatchKind, BatchOperation, BatchResult, ContinuationToken, Document, DomainType, FacetCounts,
    FieldDefinition, FieldSpec, FieldValue, IndexDeclaration, IndexSchema, ItemResult,
    SearchPage, SearchRequest, SearchResponse, SuggestParams, Suggester, VersionToken, WireType,
};
