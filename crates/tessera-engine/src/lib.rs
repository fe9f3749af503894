//! Tessera Engine: index management and querying over a remote search service.
//!
//! Every component receives the same injected [`RemoteIndexService`] handle
//! and holds no other state; schemas are fetched fresh for each operation.
//!
//! # Components
//!
//! - [`SchemaManager`]: create indexes, merge declared fields, resolve
//!   version conflicts when adding a field
//! - [`BatchMutator`]: upload, merge, and delete documents with bounded retry
//! - [`QueryEngine`]: filtered, faceted search over continuation pages
//! - [`SuggestEngine`]: typeahead completions
//! - [`SearchEngine`]: all four behind one facade configured by [`EngineConfig`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_core::{DomainType, EngineConfig, FieldSpec, IndexDeclaration, SearchRequest};
//! use tessera_engine::SearchEngine;
//! # async fn run(service: Arc<dyn tessera_core::RemoteIndexService>) -> tessera_core::Result<()> {
//! let engine = SearchEngine::new(service, EngineConfig::default())?;
//! let products = IndexDeclaration::new("products")
//!     .field(FieldSpec::new("RowKey", DomainType::String).key())
//!     .field(FieldSpec::new("Brand", DomainType::String).searchable().facetable());
//! engine.ensure_index(&products).await?;
//!
//! let page = engine
//!     .search("products", &SearchRequest::new("*").with_facet("Brand"))
//!     .await?;
//! println!("{} documents", page.len());
//! # Ok(())
//! # }
//! ```
//!
//! [`RemoteIndexService`]: tessera_core::RemoteIndexService
//! [`EngineConfig`]: tessera_core::EngineConfig

pub mod batch;
mod detail;
pub mod engine;
pub mod query;
pub mod schema;
pub mod suggest;

pub use batch::{BatchMutator, DEFAULT_ATOMIC_RETRIES, DEFAULT_MAX_RETRIES};
pub use engine::SearchEngine;
pub use query::QueryEngine;
pub use schema::{ConflictPolicy, SchemaManager};
pub use suggest::SuggestEngine;
