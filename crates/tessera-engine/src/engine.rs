//! The [`SearchEngine`] facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use tessera_core::{
    Document, DomainType, EngineConfig, FieldDefinition, FieldSpec, IndexDeclaration,
    RemoteIndexService, Result, SearchPage, SearchRequest,
};

use crate::batch::BatchMutator;
use crate::query::QueryEngine;
use crate::schema::{ConflictPolicy, SchemaManager};
use crate::suggest::SuggestEngine;

/// All four engine components over one injected service client.
///
/// Retry bounds, the creation delay, and the schema conflict policy come
/// from the [`EngineConfig`] the facade was built with. The components are
/// also reachable directly for calls that need explicit bounds.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    config: EngineConfig,
    schema: SchemaManager,
    batch: BatchMutator,
    query: QueryEngine,
    suggest: SuggestEngine,
}

impl SearchEngine {
    /// Build the facade after validating `config`.
    pub fn new(service: Arc<dyn RemoteIndexService>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(service, config))
    }

    /// Build the facade with default configuration.
    pub fn with_defaults(service: Arc<dyn RemoteIndexService>) -> Self {
        Self::build(service, EngineConfig::default())
    }

    fn build(service: Arc<dyn RemoteIndexService>, config: EngineConfig) -> Self {
        log::debug!("Creating search engine over service '{}'", service.name());
        Self {
            schema: SchemaManager::new(service.clone())
                .with_conflict_policy(ConflictPolicy::from_config(&config)),
            batch: BatchMutator::with_config(service.clone(), &config),
            query: QueryEngine::new(service.clone()),
            suggest: SuggestEngine::new(service),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The schema component.
    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    /// The batch component.
    pub fn batch(&self) -> &BatchMutator {
        &self.batch
    }

    /// The query component.
    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    /// The suggest component.
    pub fn suggester(&self) -> &SuggestEngine {
        &self.suggest
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Create or extend an index, then wait the configured creation delay.
    pub async fn ensure_index(&self, declaration: &IndexDeclaration) -> Result<bool> {
        self.schema
            .ensure_index(declaration, self.config.creation_delay())
            .await
    }

    /// Add one field to an index.
    pub async fn add_field(&self, index: &str, field: &FieldSpec) -> Result<FieldDefinition> {
        self.schema.add_field(index, field).await
    }

    /// Delete an index; an absent index counts as deleted.
    pub async fn delete_index(&self, name: &str) -> Result<bool> {
        self.schema.delete_index(name).await
    }

    /// Field names and domain types of an index.
    pub async fn fields_of(&self, index: &str) -> Result<BTreeMap<String, DomainType>> {
        self.schema.fields_of(index).await
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    /// Upload documents to the declared index, creating it first if needed.
    pub async fn upsert_batch(
        &self,
        declaration: &IndexDeclaration,
        documents: Vec<Document>,
    ) -> Result<bool> {
        self.batch
            .upsert_batch(
                &declaration.name,
                documents,
                || self.ensure_index(declaration),
                self.config.max_batch_retries,
            )
            .await
    }

    /// Upload one document to an existing index.
    pub async fn upsert_document(&self, index: &str, document: Document) -> Result<bool> {
        self.batch.upsert_document(index, document).await
    }

    /// Delete documents by key value.
    pub async fn delete_by_keys<I, S>(&self, index: &str, key_field: &str, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batch.delete_by_keys(index, key_field, keys).await
    }

    /// Delete documents, resolving the key field from the index schema.
    pub async fn delete_documents(&self, index: &str, documents: &[Document]) -> Result<bool> {
        self.batch
            .delete_documents(index, documents, self.config.max_batch_retries)
            .await
    }

    /// Merge a partial document into the stored one.
    pub async fn update_fields_atomic(&self, index: &str, document: Document) -> Result<bool> {
        self.batch.update_fields_atomic(index, document).await
    }

    /// Fetch a document by key.
    pub async fn get_document(&self, index: &str, key: &str) -> Result<Option<Document>> {
        self.batch.get_document(index, key).await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Run a search.
    pub async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchPage> {
        self.query.search(index, request).await
    }

    /// Fetch completion candidates from a suggester.
    pub async fn suggest(
        &self,
        index: &str,
        suggester: &str,
        prefix: &str,
        max_results: usize,
        fuzzy: bool,
        filter: Option<&str>,
    ) -> Result<Vec<Document>> {
        self.suggest
            .suggest(index, suggester, prefix, max_results, fuzzy, filter)
            .await
    }
}
