//! In-process [`RemoteIndexService`] implementation.
//!
//! Behaves like the remote service as far as the engine can observe:
//! optimistic-concurrency version tokens, per-item batch results, transport
//! pages linked by continuation tokens, and the service's error shapes.
//! Faults can be queued per [`Operation`] to exercise retry paths.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use tessera_core::{
    BatchKind, BatchOperation, BatchResult, ContinuationToken, Document, FacetCounts, FieldValue,
    IndexSchema, ItemResult, RemoteIndexService, ResourceKind, SearchRequest, SearchResponse,
    ServiceError, ServiceResult, SuggestParams, VersionToken, WireType,
};

use crate::filter::{self, Expr};
use crate::text::{self, Term};

/// Transport page size used when the caller does not page explicitly.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Page size applied when only `skip` is given.
pub const DEFAULT_TOP: usize = 50;

/// Service operations, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`RemoteIndexService::get_index`]
    GetIndex,
    /// [`RemoteIndexService::create_index`]
    CreateIndex,
    /// [`RemoteIndexService::create_or_update_index`]
    CreateOrUpdateIndex,
    /// [`RemoteIndexService::delete_index`]
    DeleteIndex,
    /// [`RemoteIndexService::index_exists`]
    IndexExists,
    /// [`RemoteIndexService::submit_batch`]
    SubmitBatch,
    /// [`RemoteIndexService::get_document`]
    GetDocument,
    /// [`RemoteIndexService::search`]
    Search,
    /// [`RemoteIndexService::continue_search`]
    ContinueSearch,
    /// [`RemoteIndexService::suggest`]
    Suggest,
}

struct StoredIndex {
    schema: IndexSchema,
    documents: BTreeMap<String, Document>,
}

#[derive(Default)]
struct State {
    indexes: BTreeMap<String, StoredIndex>,
    faults: HashMap<Operation, VecDeque<ServiceError>>,
    calls: HashMap<Operation, u32>,
    version: u64,
}

impl State {
    /// Count the call and pop an injected fault, if one is queued.
    fn begin(&mut self, op: Operation) -> ServiceResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                log::debug!("Injecting fault into {op:?}: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn next_version(&mut self) -> VersionToken {
        self.version += 1;
        VersionToken::new(format!("\"0x{:X}\"", self.version))
    }

    fn index(&self, name: &str) -> ServiceResult<&StoredIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Index, name))
    }

    fn index_mut(&mut self, name: &str) -> ServiceResult<&mut StoredIndex> {
        self.indexes
            .get_mut(name)
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Index, name))
    }
}

/// Position of one logical query, carried in continuation tokens.
#[derive(Serialize, Deserialize)]
struct Cursor {
    request: SearchRequest,
    offset: usize,
}

/// An in-process index service.
///
/// ```rust
/// use tessera_memory::InMemoryIndexService;
///
/// let service = InMemoryIndexService::new().with_page_size(5);
/// assert_eq!(service.page_size(), 5);
/// ```
pub struct InMemoryIndexService {
    name: String,
    page_size: usize,
    state: Mutex<State>,
}

impl InMemoryIndexService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(State::default()),
        }
    }

    /// Set the transport page size for unpaged searches (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the diagnostic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Transport page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Queue errors returned by the next calls to `op`, in order.
    pub async fn fail_next<I>(&self, op: Operation, errors: I)
    where
        I: IntoIterator<Item = ServiceError>,
    {
        let mut state = self.state.lock().await;
        state.faults.entry(op).or_default().extend(errors);
    }

    /// Drop every queued fault.
    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Number of calls made to `op`, including failed ones.
    pub async fn calls(&self, op: Operation) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Reset every call counter.
    pub async fn reset_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Number of stored documents in an index, bypassing fault injection.
    pub async fn document_count(&self, index: &str) -> Option<usize> {
        self.state
            .lock()
            .await
            .indexes
            .get(index)
            .map(|stored| stored.documents.len())
    }

    fn transport_page(
        &self,
        schema: &IndexSchema,
        request: &SearchRequest,
        matches: &[&Document],
        offset: usize,
    ) -> ServiceResult<SearchResponse> {
        let start = offset.min(matches.len());
        let end = start.saturating_add(self.page_size).min(matches.len());
        let page = &matches[start..end];

        let continuation = if end < matches.len() {
            let cursor = Cursor {
                request: request.clone(),
                offset: end,
            };
            let token = serde_json::to_string(&cursor)
                .map_err(|e| ServiceError::permanent(500, e.to_string()))?;
            Some(ContinuationToken::new(token))
        } else {
            None
        };

        log::debug!(
            "Serving transport page {start}..{end} of {} on '{}'",
            matches.len(),
            schema.name
        );

        Ok(SearchResponse {
            documents: page.iter().map(|doc| project(schema, doc)).collect(),
            facets: facet_counts(schema, page, &request.facets),
            total_count: request
                .include_total_count
                .then_some(matches.len() as u64),
            continuation,
        })
    }
}

impl Default for InMemoryIndexService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryIndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndexService")
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .finish()
    }
}

// ============================================================================
// Schema helpers
// ============================================================================

fn validate_schema(schema: &IndexSchema) -> ServiceResult<()> {
    schema.validate().map_err(|e| ServiceError::Validation {
        message: e.to_string(),
    })
}

/// Existing fields may not be removed or redefined by an update.
fn check_compatible(existing: &IndexSchema, updated: &IndexSchema) -> ServiceResult<()> {
    for field in &existing.fields {
        match updated.field(&field.name) {
            None => {
                return Err(ServiceError::Validation {
                    message: format!("Existing field '{}' cannot be removed", field.name),
                });
            }
            Some(candidate) if candidate != field => {
                return Err(ServiceError::Validation {
                    message: format!("Existing field '{}' cannot be changed", field.name),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn lookup<'a>(schema: &IndexSchema, doc: &'a Document, name: &str) -> Option<&'a FieldValue> {
    let Some(field) = schema.field(name) else {
        return doc.get(name);
    };
    doc.get(&field.name).or_else(|| {
        doc.iter()
            .find(|(candidate, _)| field.matches_name(candidate))
            .map(|(_, value)| value)
    })
}

/// Copy only retrievable fields.
fn project(schema: &IndexSchema, doc: &Document) -> Document {
    let mut projected = doc.clone();
    projected.retain(|name| schema.field(name).is_some_and(|f| f.retrievable));
    projected
}

// ============================================================================
// Batch helpers
// ============================================================================

fn coerce(value: &FieldValue, wire_type: WireType) -> Option<FieldValue> {
    match (value, wire_type) {
        (FieldValue::Null, _) => Some(FieldValue::Null),
        (FieldValue::String(_), WireType::String)
        | (FieldValue::Int32(_), WireType::Int32)
        | (FieldValue::Int64(_), WireType::Int64)
        | (FieldValue::Double(_), WireType::Double)
        | (FieldValue::Boolean(_), WireType::Boolean)
        | (FieldValue::DateTime(_), WireType::DateTimeOffset) => Some(value.clone()),
        (FieldValue::String(s), WireType::DateTimeOffset) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(FieldValue::DateTime),
        (FieldValue::Int32(v), WireType::Int64) => Some(FieldValue::Int64(i64::from(*v))),
        (FieldValue::Int32(v), WireType::Double) => Some(FieldValue::Double(f64::from(*v))),
        (FieldValue::Int64(v), WireType::Int32) => i32::try_from(*v).ok().map(FieldValue::Int32),
        (FieldValue::Int64(v), WireType::Double) => Some(FieldValue::Double(*v as f64)),
        _ => None,
    }
}

/// Resolve field names to their schema spelling and check value types.
fn normalize(schema: &IndexSchema, doc: &Document) -> ServiceResult<Document> {
    let mut normalized = Document::new();
    for (name, value) in doc.iter() {
        let field = schema.field(name).ok_or_else(|| {
            ServiceError::permanent(
                400,
                format!(
                    "The property '{name}' does not exist on type 'search.documentFields'. \
                     Make sure to only use property names that are defined by the type."
                ),
            )
        })?;
        let coerced = coerce(value, field.wire_type).ok_or_else(|| {
            ServiceError::permanent(
                400,
                format!(
                    "Cannot convert the literal '{value}' to the expected type '{}'.",
                    field.wire_type
                ),
            )
        })?;
        normalized.insert(field.name.clone(), coerced);
    }
    Ok(normalized)
}

fn apply_batch(stored: &mut StoredIndex, batch: &BatchOperation) -> ServiceResult<BatchResult> {
    let key_field = stored
        .schema
        .key_field()
        .map(|f| f.name.clone())
        .ok_or_else(|| ServiceError::Validation {
            message: format!("Index '{}' has no key field", stored.schema.name),
        })?;

    // The whole batch is rejected before any item is applied.
    let mut prepared = Vec::with_capacity(batch.len());
    for doc in &batch.documents {
        let doc = if batch.kind == BatchKind::Delete {
            let mut key_only = Document::new();
            if let Some(value) = lookup(&stored.schema, doc, &key_field) {
                key_only.insert(key_field.clone(), value.clone());
            }
            key_only
        } else {
            normalize(&stored.schema, doc)?
        };
        let key = doc
            .key(&key_field)
            .ok_or_else(|| ServiceError::Validation {
                message: format!("Document is missing key field '{key_field}'"),
            })?;
        prepared.push((key, doc));
    }

    let mut items = Vec::with_capacity(prepared.len());
    let mut failed = Vec::new();
    for (key, doc) in prepared {
        match batch.kind {
            BatchKind::Upload => {
                let status = if stored.documents.insert(key.clone(), doc).is_some() {
                    200
                } else {
                    201
                };
                items.push(ItemResult::succeeded(key, status));
            }
            BatchKind::Merge => match stored.documents.get_mut(&key) {
                Some(existing) => {
                    existing.merge_from(&doc);
                    items.push(ItemResult::succeeded(key, 200));
                }
                None => {
                    let item = ItemResult::failed(key, 404, "Document not found.");
                    items.push(item.clone());
                    failed.push(item);
                }
            },
            BatchKind::MergeOrUpload => match stored.documents.get_mut(&key) {
                Some(existing) => {
                    existing.merge_from(&doc);
                    items.push(ItemResult::succeeded(key, 200));
                }
                None => {
                    stored.documents.insert(key.clone(), doc);
                    items.push(ItemResult::succeeded(key, 201));
                }
            },
            BatchKind::Delete => {
                stored.documents.remove(&key);
                items.push(ItemResult::succeeded(key, 200));
            }
        }
    }

    if failed.is_empty() {
        Ok(BatchResult::new(items))
    } else {
        Err(ServiceError::PartialFailure { failed })
    }
}

// ============================================================================
// Query helpers
// ============================================================================

fn invalid_filter(err: filter::FilterError) -> ServiceError {
    ServiceError::permanent(400, format!("Invalid expression in $filter: {err}"))
}

fn compile_filter(schema: &IndexSchema, filter: Option<&str>) -> ServiceResult<Option<Expr>> {
    let Some(filter) = filter else {
        return Ok(None);
    };
    let expr = filter::parse(filter).map_err(invalid_filter)?;
    expr.check(schema).map_err(invalid_filter)?;
    Ok(Some(expr))
}

fn check_facets(schema: &IndexSchema, facets: &[String]) -> ServiceResult<()> {
    for name in facets {
        let field = schema.field(name).ok_or_else(|| {
            ServiceError::permanent(
                400,
                format!("Facet field '{name}' does not exist on index '{}'", schema.name),
            )
        })?;
        if !field.facetable {
            return Err(ServiceError::permanent(
                400,
                format!("Field '{}' is not facetable", field.name),
            ));
        }
    }
    Ok(())
}

fn matches_text(schema: &IndexSchema, doc: &Document, terms: &[Term]) -> bool {
    schema
        .fields
        .iter()
        .filter(|f| f.searchable)
        .filter_map(|f| doc.get(&f.name).and_then(FieldValue::as_str))
        .flat_map(text::tokenize)
        .any(|token| terms.iter().any(|term| term.matches(&token)))
}

fn run_query<'a>(
    stored: &'a StoredIndex,
    request: &SearchRequest,
) -> ServiceResult<Vec<&'a Document>> {
    let schema = &stored.schema;
    let filter = compile_filter(schema, request.filter.as_deref())?;
    check_facets(schema, &request.facets)?;
    let terms = text::parse_query(&request.query);

    Ok(stored
        .documents
        .values()
        .filter(|doc| terms.as_deref().is_none_or(|terms| matches_text(schema, doc, terms)))
        .filter(|doc| {
            filter
                .as_ref()
                .is_none_or(|expr| expr.matches(&|name: &str| lookup(schema, doc, name)))
        })
        .collect())
}

fn facet_counts(schema: &IndexSchema, docs: &[&Document], requested: &[String]) -> FacetCounts {
    let mut facets = FacetCounts::new();
    for name in requested {
        facets.ensure_field(name.clone());
        for doc in docs {
            if let Some(value) = lookup(schema, doc, name).filter(|v| !v.is_null()) {
                facets.record(name, value);
            }
        }
    }
    facets
}

// ============================================================================
// RemoteIndexService
// ============================================================================

#[async_trait]
impl RemoteIndexService for InMemoryIndexService {
    async fn get_index(&self, name: &str) -> ServiceResult<IndexSchema> {
        let mut state = self.state.lock().await;
        state.begin(Operation::GetIndex)?;
        Ok(state.index(name)?.schema.clone())
    }

    async fn create_index(&self, schema: &IndexSchema) -> ServiceResult<IndexSchema> {
        let mut state = self.state.lock().await;
        state.begin(Operation::CreateIndex)?;
        validate_schema(schema)?;
        if state.indexes.contains_key(&schema.name) {
            return Err(ServiceError::Conflict {
                message: format!("Index '{}' already exists", schema.name),
            });
        }

        let mut stored = schema.clone();
        stored.version = Some(state.next_version());
        log::info!("Created index '{}' with {} fields", stored.name, stored.fields.len());
        state.indexes.insert(
            stored.name.clone(),
            StoredIndex {
                schema: stored.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(stored)
    }

    async fn create_or_update_index(
        &self,
        schema: &IndexSchema,
        version: Option<&VersionToken>,
    ) -> ServiceResult<IndexSchema> {
        let mut state = self.state.lock().await;
        state.begin(Operation::CreateOrUpdateIndex)?;
        validate_schema(schema)?;

        match state.indexes.get(&schema.name) {
            Some(existing) => {
                if version.is_some_and(|v| existing.schema.version.as_ref() != Some(v)) {
                    return Err(ServiceError::VersionConflict {
                        index: schema.name.clone(),
                    });
                }
                check_compatible(&existing.schema, schema)?;
            }
            None if version.is_some() => {
                return Err(ServiceError::VersionConflict {
                    index: schema.name.clone(),
                });
            }
            None => {}
        }

        let mut stored = schema.clone();
        stored.version = Some(state.next_version());
        match state.indexes.get_mut(&schema.name) {
            Some(existing) => {
                log::info!("Updated index '{}' to {} fields", stored.name, stored.fields.len());
                existing.schema = stored.clone();
            }
            None => {
                log::info!("Created index '{}' with {} fields", stored.name, stored.fields.len());
                state.indexes.insert(
                    stored.name.clone(),
                    StoredIndex {
                        schema: stored.clone(),
                        documents: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(stored)
    }

    async fn delete_index(&self, name: &str) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state.begin(Operation::DeleteIndex)?;
        match state.indexes.remove(name) {
            Some(_) => {
                log::info!("Deleted index '{name}'");
                Ok(())
            }
            None => Err(ServiceError::not_found(ResourceKind::Index, name)),
        }
    }

    async fn index_exists(&self, name: &str) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        state.begin(Operation::IndexExists)?;
        Ok(state.indexes.contains_key(name))
    }

    async fn submit_batch(
        &self,
        index: &str,
        batch: &BatchOperation,
    ) -> ServiceResult<BatchResult> {
        let mut state = self.state.lock().await;
        state.begin(Operation::SubmitBatch)?;
        let stored = state.index_mut(index)?;
        log::debug!("Applying {} batch of {} to '{index}'", batch.kind, batch.len());
        apply_batch(stored, batch)
    }

    async fn get_document(&self, index: &str, key: &str) -> ServiceResult<Document> {
        let mut state = self.state.lock().await;
        state.begin(Operation::GetDocument)?;
        let stored = state.index(index)?;
        stored
            .documents
            .get(key)
            .map(|doc| project(&stored.schema, doc))
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Document, key))
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> ServiceResult<SearchResponse> {
        let mut state = self.state.lock().await;
        state.begin(Operation::Search)?;
        let stored = state.index(index)?;
        let matches = run_query(stored, request)?;

        if !request.is_paged() {
            return self.transport_page(&stored.schema, request, &matches, 0);
        }

        let skip = request.skip.unwrap_or(0);
        let top = request.top.unwrap_or(DEFAULT_TOP);
        Ok(SearchResponse {
            documents: matches
                .iter()
                .skip(skip)
                .take(top)
                .map(|doc| project(&stored.schema, doc))
                .collect(),
            facets: facet_counts(&stored.schema, &matches, &request.facets),
            total_count: request
                .include_total_count
                .then_some(matches.len() as u64),
            continuation: None,
        })
    }

    async fn continue_search(
        &self,
        index: &str,
        token: &ContinuationToken,
    ) -> ServiceResult<SearchResponse> {
        let mut state = self.state.lock().await;
        state.begin(Operation::ContinueSearch)?;
        let cursor: Cursor = serde_json::from_str(token.as_str())
            .map_err(|e| ServiceError::permanent(400, format!("Invalid continuation token: {e}")))?;
        let stored = state.index(index)?;
        let matches = run_query(stored, &cursor.request)?;
        self.transport_page(&stored.schema, &cursor.request, &matches, cursor.offset)
    }

    async fn suggest(
        &self,
        index: &str,
        suggester: &str,
        prefix: &str,
        params: &SuggestParams,
    ) -> ServiceResult<Vec<Document>> {
        let mut state = self.state.lock().await;
        state.begin(Operation::Suggest)?;
        let stored = state.index(index)?;
        let schema = &stored.schema;
        let definition = schema
            .suggester(suggester)
            .ok_or_else(|| ServiceError::not_found(ResourceKind::Suggester, suggester))?;
        if prefix.trim().is_empty() {
            return Err(ServiceError::permanent(
                400,
                "The search text must be at least 1 character",
            ));
        }
        let filter = compile_filter(schema, params.filter.as_deref())?;

        Ok(stored
            .documents
            .values()
            .filter(|doc| {
                filter
                    .as_ref()
                    .is_none_or(|expr| expr.matches(&|name: &str| lookup(schema, doc, name)))
            })
            .filter(|doc| {
                definition.source_fields.iter().any(|source| {
                    lookup(schema, doc, source)
                        .and_then(FieldValue::as_str)
                        .is_some_and(|value| text::suggest_matches(value, prefix, params.fuzzy))
                })
            })
            .take(params.top)
            .map(|doc| project(schema, doc))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Tests
// ============================================================================
