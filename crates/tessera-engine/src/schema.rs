//! Schema Manager: index creation, field evolution, and deletion.
//!
//! The remote service owns the authoritative schema. Every operation here
//! fetches a fresh copy, changes it, and submits it back; nothing is cached.
//!
//! Concurrent writers are tolerated by [`SchemaManager::add_field`], which
//! submits with the fetched version token and starts over from the fetch when
//! the service reports a version conflict.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::{
    DomainType, EngineConfig, Error, FieldDefinition, FieldSpec, IndexDeclaration, IndexSchema,
    RemoteIndexService, ResourceKind, Result, ServiceError,
};

// ============================================================================
// ConflictPolicy
// ============================================================================

/// How `add_field` reacts to version conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictPolicy {
    /// Give up after this many conflicts; unbounded when `None`.
    pub max_attempts: Option<u32>,
    /// Wait before re-fetching after a conflict.
    pub backoff: Duration,
}

impl ConflictPolicy {
    /// Retry forever with no wait.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `max_attempts` conflicts.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Duration::ZERO,
        }
    }

    /// Wait `backoff` between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Policy described by an engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.schema_conflict_max_attempts,
            backoff: config.schema_conflict_backoff(),
        }
    }

    fn exhausted(&self, conflicts: u32) -> bool {
        self.max_attempts.is_some_and(|max| conflicts >= max)
    }
}

// ============================================================================
// SchemaManager
// ============================================================================

/// Creates indexes and evolves their schemas.
#[derive(Clone)]
pub struct SchemaManager {
    service: Arc<dyn RemoteIndexService>,
    conflict: ConflictPolicy,
}

impl SchemaManager {
    /// Create a manager over an injected service client.
    pub fn new(service: Arc<dyn RemoteIndexService>) -> Self {
        Self {
            service,
            conflict: ConflictPolicy::default(),
        }
    }

    /// Replace the conflict policy used by `add_field`.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict = policy;
        self
    }

    /// The active conflict policy.
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict
    }

    /// Create the index if absent, or merge new fields and suggesters into it.
    ///
    /// Fields already on the index are left as they are; declared fields and
    /// suggesters it lacks are appended. Calling this twice with the same
    /// declaration leaves the schema unchanged. Waits `creation_delay` after a
    /// successful submission.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDeclaration`] if the declaration fails validation
    /// - [`Error::DuplicateKeyField`] if it declares a different key than the index has
    /// - [`Error::Schema`] wrapping any service failure; never retried
    pub async fn ensure_index(
        &self,
        declaration: &IndexDeclaration,
        creation_delay: Duration,
    ) -> Result<bool> {
        let desired = declaration.to_schema()?;
        let index = desired.name.clone();

        let current = self
            .fetch(&index)
            .await
            .map_err(|e| Error::schema(&index, e))?;

        let (target, version) = match current {
            None => (desired, None),
            Some(current) => {
                let merged = merge_schema(&current, &desired)?;
                if merged.same_shape(&current) {
                    log::debug!("Index '{index}' already matches its declaration");
                    return Ok(true);
                }
                (merged, current.version)
            }
        };

        let stored = self
            .service
            .create_or_update_index(&target, version.as_ref())
            .await
            .map_err(|e| Error::schema(&index, e))?;
        log::info!(
            "Ensured index '{index}' ({} fields, {} suggesters)",
            stored.fields.len(),
            stored.suggesters.len()
        );

        if !creation_delay.is_zero() {
            tokio::time::sleep(creation_delay).await;
        }
        Ok(true)
    }

    /// Add one field to an index, creating the index if it does not exist.
    ///
    /// Returns the existing definition when a field with the same name
    /// (case-insensitive) is already present. On a version conflict the
    /// schema is re-fetched and the change re-applied.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKeyField`] if `field` is a key and the index already has one
    /// - [`Error::ConflictRetriesExhausted`] if the conflict policy's cap is reached
    /// - [`Error::Service`] for any other service failure
    pub async fn add_field(&self, index: &str, field: &FieldSpec) -> Result<FieldDefinition> {
        let definition = field.to_definition();
        let mut conflicts = 0u32;

        loop {
            let current = match self.service.get_index(index).await {
                Ok(schema) => schema,
                Err(e) if e.is_not_found_of(ResourceKind::Index) => {
                    self.create_minimal(index, &definition).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(existing) = current.field(&definition.name) {
                return Ok(existing.clone());
            }
            if definition.key {
                if let Some(key) = current.key_field() {
                    return Err(Error::DuplicateKeyField {
                        index: index.to_string(),
                        existing: key.name.clone(),
                        requested: definition.name.clone(),
                    });
                }
            }

            let updated = current.clone().with_field(definition.clone());
            match self
                .service
                .create_or_update_index(&updated, current.version.as_ref())
                .await
            {
                Ok(stored) => {
                    log::info!("Added field '{}' to index '{index}'", definition.name);
                    return Ok(stored.field(&definition.name).cloned().unwrap_or(definition));
                }
                Err(ServiceError::VersionConflict { .. }) => {
                    conflicts += 1;
                    log::warn!(
                        "Schema of index '{index}' changed while adding '{}' (conflict {conflicts}); retrying",
                        definition.name
                    );
                    if self.conflict.exhausted(conflicts) {
                        return Err(Error::ConflictRetriesExhausted {
                            index: index.to_string(),
                            attempts: conflicts,
                        });
                    }
                    if !self.conflict.backoff.is_zero() {
                        tokio::time::sleep(self.conflict.backoff).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete an index. An index that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Any service failure other than not-found, without retry.
    pub async fn delete_index(&self, name: &str) -> Result<bool> {
        match self.service.delete_index(name).await {
            Ok(()) => {
                log::info!("Deleted index '{name}'");
                Ok(true)
            }
            Err(e) if e.is_not_found_of(ResourceKind::Index) => {
                log::debug!("Index '{name}' already doesn't exist");
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Field names and domain types of an index; empty if it does not exist.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`] if a field's wire type has no domain
    /// counterpart, or any service failure other than not-found.
    pub async fn fields_of(&self, index: &str) -> Result<BTreeMap<String, DomainType>> {
        let Some(schema) = self.fetch(index).await? else {
            return Ok(BTreeMap::new());
        };
        schema
            .fields
            .iter()
            .map(|f| Ok((f.name.clone(), f.domain_type()?)))
            .collect()
    }

    /// Fetch an index schema; `None` if it does not exist.
    pub async fn get_schema(&self, index: &str) -> Result<Option<IndexSchema>> {
        Ok(self.fetch(index).await?)
    }

    /// Whether the index exists.
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.service.index_exists(index).await?)
    }

    async fn fetch(&self, index: &str) -> std::result::Result<Option<IndexSchema>, ServiceError> {
        match self.service.get_index(index).await {
            Ok(schema) => Ok(Some(schema)),
            Err(e) if e.is_not_found_of(ResourceKind::Index) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_minimal(&self, index: &str, definition: &FieldDefinition) -> Result<()> {
        let schema = IndexSchema::new(index).with_field(definition.clone());
        match self.service.create_index(&schema).await {
            Ok(_) => {
                log::info!("Created index '{index}' for field '{}'", definition.name);
                Ok(())
            }
            // Another writer created it first.
            Err(ServiceError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("service", &self.service.name())
            .field("conflict", &self.conflict)
            .finish()
    }
}

/// Append declared fields and suggesters the current schema lacks.
fn merge_schema(current: &IndexSchema, desired: &IndexSchema) -> Result<IndexSchema> {
    let mut merged = current.clone();

    for field in &desired.fields {
        if merged.field(&field.name).is_some() {
            continue;
        }
        if field.key {
            if let Some(key) = merged.key_field() {
                return Err(Error::DuplicateKeyField {
                    index: current.name.clone(),
                    existing: key.name.clone(),
                    requested: field.name.clone(),
                });
            }
        }
        merged.fields.push(field.clone());
    }

    for suggester in &desired.suggesters {
        if merged.suggester(&suggester.name).is_none() {
            merged.suggesters.push(suggester.clone());
        }
    }

    merged.validate()?;
    Ok(merged)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tessera_core::Suggester;
    use tessera_memory::{InMemoryIndexService, Operation};

    fn declaration() -> IndexDeclaration {
        IndexDeclaration::new("products")
            .field(FieldSpec::new("RowKey", DomainType::String).key())
            .field(FieldSpec::new("Brand", DomainType::String).searchable().facetable())
            .field(FieldSpec::new("ProductName", DomainType::String).searchable())
            .suggester(Suggester::new("sg", ["RowKey", "ProductName"]))
    }

    fn manager() -> (Arc<InMemoryIndexService>, SchemaManager) {
        let service = Arc::new(InMemoryIndexService::new());
        let manager = SchemaManager::new(service.clone());
        (service, manager)
    }

    #[tokio::test]
    async fn test_ensure_index_creates() {
        let (service, manager) = manager();
        assert!(manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap());
        let schema = manager.get_schema("products").await.unwrap().unwrap();
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(service.calls(Operation::CreateOrUpdateIndex).await, 1);
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let (service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        let first = manager.get_schema("products").await.unwrap().unwrap();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        let second = manager.get_schema("products").await.unwrap().unwrap();

        assert!(first.same_shape(&second));
        assert_eq!(service.calls(Operation::CreateOrUpdateIndex).await, 1);
    }

    #[tokio::test]
    async fn test_ensure_index_merges_new_fields_and_suggesters() {
        let (_service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();

        let extended = declaration()
            .field(FieldSpec::new("AddedField1", DomainType::String).hidden())
            .field(FieldSpec::new("AddedField2", DomainType::String).hidden())
            .suggester(Suggester::new("sgAdded", ["AddedField1", "AddedField2"]));
        manager.ensure_index(&extended, Duration::ZERO).await.unwrap();

        let schema = manager.get_schema("products").await.unwrap().unwrap();
        assert_eq!(schema.fields.len(), 5);
        assert_eq!(schema.suggesters.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_index_rejects_different_key() {
        let (_service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();

        let other_key = IndexDeclaration::new("products")
            .field(FieldSpec::new("Id", DomainType::String).key());
        let err = manager
            .ensure_index(&other_key, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKeyField { .. }));
    }

    #[tokio::test]
    async fn test_ensure_index_wraps_service_failure() {
        let (service, manager) = manager();
        service
            .fail_next(
                Operation::CreateOrUpdateIndex,
                [ServiceError::transient(503, "busy")],
            )
            .await;
        let err = manager
            .ensure_index(&declaration(), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema { ref index, .. } if index == "products"));
        assert_eq!(service.calls(Operation::CreateOrUpdateIndex).await, 1);
    }

    #[tokio::test]
    async fn test_ensure_index_waits_creation_delay() {
        let (_service, manager) = manager();
        let start = std::time::Instant::now();
        manager
            .ensure_index(&declaration(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_add_field_returns_existing_case_insensitive() {
        let (service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        service.reset_calls().await;

        let existing = manager
            .add_field("products", &FieldSpec::new("brand", DomainType::Int32))
            .await
            .unwrap();
        assert_eq!(existing.name, "Brand");
        assert_eq!(service.calls(Operation::CreateOrUpdateIndex).await, 0);
    }

    #[tokio::test]
    async fn test_add_field_appends() {
        let (_service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();

        let added = manager
            .add_field("products", &FieldSpec::new("Sku", DomainType::String).filterable())
            .await
            .unwrap();
        assert!(added.filterable);

        let fields = manager.fields_of("products").await.unwrap();
        assert_eq!(fields.get("Sku"), Some(&DomainType::String));
    }

    #[tokio::test]
    async fn test_add_field_rejects_second_key() {
        let (_service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        let before = manager.get_schema("products").await.unwrap().unwrap();

        let err = manager
            .add_field("products", &FieldSpec::new("Id", DomainType::String).key())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKeyField { ref existing, .. } if existing == "RowKey"));

        let after = manager.get_schema("products").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_add_field_creates_missing_index() {
        let (_service, manager) = manager();
        let field = manager
            .add_field("fresh", &FieldSpec::new("RowKey", DomainType::String).key())
            .await
            .unwrap();
        assert!(field.key);
        assert!(manager.index_exists("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_field_retries_conflicts() {
        let (service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        service.reset_calls().await;
        service
            .fail_next(
                Operation::CreateOrUpdateIndex,
                [
                    ServiceError::VersionConflict { index: "products".into() },
                    ServiceError::VersionConflict { index: "products".into() },
                ],
            )
            .await;

        manager
            .add_field("products", &FieldSpec::new("Sku", DomainType::String))
            .await
            .unwrap();
        assert_eq!(service.calls(Operation::GetIndex).await, 3);
        assert_eq!(service.calls(Operation::CreateOrUpdateIndex).await, 3);
    }

    #[tokio::test]
    async fn test_add_field_conflict_cap() {
        let (service, manager) = manager();
        let manager = manager.with_conflict_policy(ConflictPolicy::bounded(2));
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        service
            .fail_next(
                Operation::CreateOrUpdateIndex,
                std::iter::repeat_n(
                    ServiceError::VersionConflict { index: "products".into() },
                    5,
                ),
            )
            .await;

        let err = manager
            .add_field("products", &FieldSpec::new("Sku", DomainType::String))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConflictRetriesExhausted { attempts: 2, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_index_absent_is_success() {
        let (_service, manager) = manager();
        manager.ensure_index(&declaration(), Duration::ZERO).await.unwrap();
        assert!(manager.delete_index("products").await.unwrap());
        assert!(manager.delete_index("products").await.unwrap());
        assert!(!manager.index_exists("products").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_index_other_failure() {
        let (service, manager) = manager();
        service
            .fail_next(Operation::DeleteIndex, [ServiceError::permanent(403, "Forbidden")])
            .await;
        let err = manager.delete_index("products").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_fields_of_missing_index_is_empty() {
        let (_service, manager) = manager();
        assert!(manager.fields_of("nope").await.unwrap().is_empty());
    }

    #[test]
    fn test_conflict_policy_from_config() {
        let config = EngineConfig {
            schema_conflict_max_attempts: Some(4),
            schema_conflict_backoff_ms: 10,
            ..EngineConfig::default()
        };
        let policy = ConflictPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, Some(4));
        assert_eq!(policy.backoff, Duration::from_millis(10));
        assert!(!ConflictPolicy::unbounded().exhausted(u32::MAX));
    }

    mod merge_props {
        use super::*;
        use proptest::collection::btree_set;
        use proptest::prelude::*;

        fn schema_of<'a>(names: impl IntoIterator<Item = &'a String>) -> IndexSchema {
            names.into_iter().fold(IndexSchema::new("idx"), |schema, name| {
                schema.with_field(FieldSpec::new(name.clone(), DomainType::String).to_definition())
            })
        }

        proptest! {
            #[test]
            fn test_merge_with_self_is_unchanged(names in btree_set("[A-Z][a-z]{1,8}", 1..8)) {
                let schema = schema_of(&names);
                let merged = merge_schema(&schema, &schema).unwrap();
                prop_assert!(merged.same_shape(&schema));
            }

            #[test]
            fn test_merge_appends_after_existing(
                existing in btree_set("[A-Z][a-z]{1,8}", 1..6),
                declared in btree_set("[A-Z][a-z]{1,8}", 0..6),
            ) {
                let current = schema_of(&existing);
                let desired = schema_of(&declared);
                let merged = merge_schema(&current, &desired).unwrap();

                prop_assert_eq!(&merged.fields[..current.fields.len()], &current.fields[..]);
                for name in existing.union(&declared) {
                    prop_assert!(merged.field(name).is_some());
                }
                prop_assert_eq!(merged.fields.len(), existing.union(&declared).count());
            }
        }
    }
}
