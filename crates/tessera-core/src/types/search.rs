//! Search and suggest request/response types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::document::{Document, FieldValue};

// ============================================================================
// SearchRequest
// ============================================================================

/// A search as submitted to the service.
///
/// ```rust
/// use tessera_core::SearchRequest;
///
/// let request = SearchRequest::new("*")
///     .with_facet("Brand")
///     .with_total_count()
///     .with_top(5);
/// assert!(request.is_paged());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Full-text query; `*` matches every document.
    pub query: String,
    /// Filter expression, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Fields to compute facet counts for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    /// Whether the total match count is requested.
    #[serde(default)]
    pub include_total_count: bool,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    /// Page offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

impl SearchRequest {
    /// Create a request for the given query text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Set the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Request facet counts for a field.
    pub fn with_facet(mut self, field: impl Into<String>) -> Self {
        self.facets.push(field.into());
        self
    }

    /// Request facet counts for several fields.
    pub fn with_facets<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Request the total match count.
    pub fn with_total_count(mut self) -> Self {
        self.include_total_count = true;
        self
    }

    /// Set the page size.
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// Set the page offset.
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Whether the caller asked for an explicit page.
    pub fn is_paged(&self) -> bool {
        self.top.is_some() || self.skip.is_some()
    }
}

// ============================================================================
// ContinuationToken
// ============================================================================

/// Opaque cursor for the next transport page of one logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// FacetCounts
// ============================================================================

/// Facet map: field → stringified value → document count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetCounts(BTreeMap<String, BTreeMap<String, u64>>);

impl FacetCounts {
    /// Create an empty facet map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` to the bucket for `value` of `field`.
    pub fn add(&mut self, field: impl Into<String>, value: impl Into<String>, count: u64) {
        *self
            .0
            .entry(field.into())
            .or_default()
            .entry(value.into())
            .or_insert(0) += count;
    }

    /// Count one document's value for `field`.
    pub fn record(&mut self, field: &str, value: &FieldValue) {
        self.add(field, value.to_string(), 1);
    }

    /// Make sure `field` has an entry, even when no document carries it.
    pub fn ensure_field(&mut self, field: impl Into<String>) {
        self.0.entry(field.into()).or_default();
    }

    /// Sum another facet map into this one.
    pub fn merge(&mut self, other: &FacetCounts) {
        for (field, buckets) in &other.0 {
            let target = self.0.entry(field.clone()).or_default();
            for (value, count) in buckets {
                *target.entry(value.clone()).or_insert(0) += count;
            }
        }
    }

    /// Drop every field not in `fields` (case-insensitive).
    pub fn retain_fields(&mut self, fields: &[String]) {
        self.0
            .retain(|name, _| fields.iter().any(|f| f.eq_ignore_ascii_case(name)));
    }

    /// Buckets for a field.
    pub fn get(&self, field: &str) -> Option<&BTreeMap<String, u64>> {
        self.0.get(field)
    }

    /// Count for one bucket; zero when absent.
    pub fn count(&self, field: &str, value: &str) -> u64 {
        self.get(field)
            .and_then(|buckets| buckets.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Field names present.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Responses
// ============================================================================

/// One transport page returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Documents on this transport page.
    pub documents: Vec<Document>,
    /// Facet counts reported with this page.
    #[serde(default)]
    pub facets: FacetCounts,
    /// Total matches, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Cursor for the next page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<ContinuationToken>,
}

/// The caller-visible result of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Documents, in service order.
    pub documents: Vec<Document>,
    /// Facet counts for requested fields only.
    pub facets: FacetCounts,
    /// Total matches, when requested.
    pub total_count: Option<u64>,
}

impl SearchPage {
    /// Fold one transport page into this result.
    ///
    /// Documents are appended and facet counts summed. The first total count
    /// seen wins.
    pub fn absorb(&mut self, response: SearchResponse) {
        self.documents.extend(response.documents);
        self.facets.merge(&response.facets);
        if self.total_count.is_none() {
            self.total_count = response.total_count;
        }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents were returned.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl From<SearchResponse> for SearchPage {
    fn from(response: SearchResponse) -> Self {
        Self {
            documents: response.documents,
            facets: response.facets,
            total_count: response.total_count,
        }
    }
}

/// Parameters for a suggest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestParams {
    /// Maximum number of candidates.
    pub top: usize,
    /// Allow one-edit typos in the prefix.
    pub fuzzy: bool,
    /// Filter expression restricting candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Default for SuggestParams {
    fn default() -> Self {
        Self {
            top: 5,
            fuzzy: false,
            filter: None,
        }
    }
}
