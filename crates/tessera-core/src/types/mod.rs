//! Data model shared by every engine component.

mod batch;
mod document;
mod field;
mod proptests;
mod schema;
mod search;

pub use batch::{BatchKind, BatchOperation, BatchResult, ItemResult};
pub use document::{Document, FieldValue};
pub use field::{DomainType, FieldDefinition, FieldSpec, WireType};
pub use schema::{IndexDeclaration, IndexSchema, Suggester, VersionToken};
pub use search::{
    ContinuationToken, FacetCounts, SearchPage, SearchRequest, SearchResponse, SuggestParams,
};
