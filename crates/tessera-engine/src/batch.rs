//! Batch Mutator: document upload, merge, and delete with bounded retry.
//!
//! Every batch is submitted whole. A transient failure (a retryable fault or
//! a partially rejected batch) re-submits the entire batch, including items
//! that already succeeded; uploads and deletes are idempotent, so replaying
//! them is harmless. Retries run back to back with no delay.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tessera_core::{
    BatchOperation, Document, EngineConfig, Error, RemoteIndexService, ResourceKind,
    Result, ServiceError,
};

use crate::detail::classify_mutation_error;

/// Default extra submissions after a transient batch failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default extra submissions of an atomic partial update.
pub const DEFAULT_ATOMIC_RETRIES: u32 = 10;

/// Uploads, merges, and deletes documents.
#[derive(Clone)]
pub struct BatchMutator {
    service: Arc<dyn RemoteIndexService>,
    max_retries: u32,
    atomic_retries: u32,
}

impl BatchMutator {
    /// Create a mutator with the default retry bounds.
    pub fn new(service: Arc<dyn RemoteIndexService>) -> Self {
        Self {
            service,
            max_retries: DEFAULT_MAX_RETRIES,
            atomic_retries: DEFAULT_ATOMIC_RETRIES,
        }
    }

    /// Create a mutator with the retry bounds from `config`.
    pub fn with_config(service: Arc<dyn RemoteIndexService>, config: &EngineConfig) -> Self {
        Self {
            service,
            max_retries: config.max_batch_retries,
            atomic_retries: config.atomic_update_retries,
        }
    }

    /// Retry bound used when the caller does not pass one.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retry bound for `update_fields_atomic`.
    pub fn atomic_retries(&self) -> u32 {
        self.atomic_retries
    }

    /// Upload documents, creating the index through `ensure` if it is absent.
    ///
    /// `ensure` runs only when the index does not exist; it must return
    /// `Ok(true)` once the index is in place. The batch is then submitted up
    /// to `max_retries + 1` times while it keeps failing transiently. An
    /// empty document list succeeds without contacting the service.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexNotFound`] if the index is still missing after `ensure`
    /// - [`Error::RetriesExhausted`] once every attempt failed transiently
    /// - [`Error::UnknownField`], [`Error::InvalidFieldValue`], or
    ///   [`Error::Indexing`] for permanent failures, without retry
    pub async fn upsert_batch<F, Fut>(
        &self,
        index: &str,
        documents: Vec<Document>,
        ensure: F,
        max_retries: u32,
    ) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        if documents.is_empty() {
            return Ok(true);
        }

        if !self.service.index_exists(index).await? {
            log::info!("Index '{index}' does not exist; ensuring it before upload");
            if !ensure().await? {
                return Err(Error::IndexNotFound {
                    index: index.to_string(),
                });
            }
        }

        self.submit(index, BatchOperation::upload(documents), max_retries)
            .await
    }

    /// Upload a single document with the configured retry bound.
    ///
    /// Does not create the index.
    pub async fn upsert_document(&self, index: &str, document: Document) -> Result<bool> {
        self.submit(index, BatchOperation::upload(vec![document]), self.max_retries)
            .await
    }

    /// Delete documents by key value with the configured retry bound.
    ///
    /// Keys that do not exist are not an error. An empty key list succeeds
    /// without contacting the service.
    pub async fn delete_by_keys<I, S>(&self, index: &str, key_field: &str, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let batch = BatchOperation::delete_keys(key_field, keys);
        if batch.is_empty() {
            return Ok(true);
        }
        self.submit(index, batch, self.max_retries).await
    }

    /// Delete documents, resolving the key field from the index schema.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexNotFound`] if the index does not exist
    /// - [`Error::NoKeyField`] if the index defines no key
    /// - [`Error::MissingKey`] if a document has no key value
    pub async fn delete_documents(
        &self,
        index: &str,
        documents: &[Document],
        max_retries: u32,
    ) -> Result<bool> {
        if documents.is_empty() {
            return Ok(true);
        }

        let schema = self
            .service
            .get_index(index)
            .await
            .map_err(|e| not_found_as_index(index, e))?;
        let key_field = schema
            .key_field()
            .map(|f| f.name.clone())
            .ok_or_else(|| Error::NoKeyField {
                index: index.to_string(),
            })?;

        let keys = documents
            .iter()
            .map(|doc| {
                doc.key(&key_field).ok_or_else(|| Error::MissingKey {
                    field: key_field.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.submit(
            index,
            BatchOperation::delete_keys(&key_field, keys),
            max_retries,
        )
        .await
    }

    /// Merge a partial document into the stored one.
    ///
    /// Only the fields present in `document` change; it must carry the key.
    /// Transient failures are retried up to the atomic retry bound.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownField`] naming the field the service rejected
    /// - [`Error::InvalidFieldValue`] if a value fails type validation
    /// - [`Error::Indexing`] for any other failure, including a missing document
    pub async fn update_fields_atomic(&self, index: &str, document: Document) -> Result<bool> {
        self.submit(index, BatchOperation::merge(vec![document]), self.atomic_retries)
            .await
    }

    /// Fetch a document by key; `None` if it or the index does not exist.
    pub async fn get_document(&self, index: &str, key: &str) -> Result<Option<Document>> {
        match self.service.get_document(index, key).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn submit(&self, index: &str, batch: BatchOperation, max_retries: u32) -> Result<bool> {
        let attempts = AtomicU32::new(0);
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::ZERO)
            .with_max_times(max_retries as usize);

        let outcome = (|| async {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            log::debug!(
                "Submitting {} batch of {} to '{index}' (attempt {attempt})",
                batch.kind,
                batch.len()
            );
            self.service.submit_batch(index, &batch).await
        })
        .retry(backoff)
        .when(is_replayable)
        .notify(|err: &ServiceError, _| {
            log::warn!("Transient failure on {} batch for '{index}': {err}; retrying", batch.kind);
        })
        .await;

        match outcome {
            Ok(_) => Ok(true),
            Err(e) if is_replayable(&e) => Err(Error::RetriesExhausted {
                operation: batch.kind,
                index: index.to_string(),
                attempts: attempts.load(Ordering::Relaxed),
                source: e,
            }),
            Err(e) => Err(not_found_as_index(index, e)),
        }
    }
}

impl std::fmt::Debug for BatchMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchMutator")
            .field("service", &self.service.name())
            .field("max_retries", &self.max_retries)
            .field("atomic_retries", &self.atomic_retries)
            .finish()
    }
}

/// Transient failures are replayed, except a merge whose every rejected
/// item was a missing document. A partial failure with no item detail
/// counts as transient.
fn is_replayable(err: &ServiceError) -> bool {
    match err {
        ServiceError::PartialFailure { failed } => {
            failed.is_empty() || failed.iter().any(|item| item.status != 404)
        }
        _ => err.is_transient(),
    }
}

fn not_found_as_index(index: &str, err: ServiceError) -> Error {
    if err.is_not_found_of(ResourceKind::Index) {
        Error::IndexNotFound {
            index: index.to_string(),
        }
    } else {
        classify_mutation_error(index, err)
    }
}

// ============================================================================
// Tests
// ============================================================================
