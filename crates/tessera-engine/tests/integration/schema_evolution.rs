//! Integration tests for index creation, field evolution, and deletion.

use tessera_core::{
    Document, DomainType, EngineConfig, Error, FieldSpec, IndexDeclaration, SearchRequest,
    ServiceError, Suggester,
};
use tessera_memory::Operation;

use crate::common::{TestHarness, product_declaration};

#[tokio::test]
async fn test_ensure_index_twice_yields_same_schema() {
    let harness = TestHarness::new();
    let declaration = harness.declaration();

    assert!(harness.engine.ensure_index(&declaration).await.unwrap());
    let first = harness
        .engine
        .schema()
        .get_schema(&harness.index)
        .await
        .unwrap()
        .unwrap();

    assert!(harness.engine.ensure_index(&declaration).await.unwrap());
    let second = harness
        .engine
        .schema()
        .get_schema(&harness.index)
        .await
        .unwrap()
        .unwrap();

    assert!(first.same_shape(&second));
}

#[tokio::test]
async fn test_second_key_field_rejected_and_schema_unchanged() {
    let harness = TestHarness::new();
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    let before = harness.engine.fields_of(&harness.index).await.unwrap();

    let err = harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("Id", DomainType::String).key())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::DuplicateKeyField { ref existing, ref requested, .. }
            if existing == "RowKey" && requested == "Id"
    ));
    assert_eq!(harness.engine.fields_of(&harness.index).await.unwrap(), before);
}

#[tokio::test]
async fn test_fields_of_reports_domain_types() {
    let harness = TestHarness::new();
    assert!(harness.engine.fields_of(&harness.index).await.unwrap().is_empty());

    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    let fields = harness.engine.fields_of(&harness.index).await.unwrap();

    assert_eq!(fields.len(), 5);
    assert_eq!(fields.get("RowKey"), Some(&DomainType::String));
    assert_eq!(fields.get("Cost"), Some(&DomainType::Float64));
}

#[tokio::test]
async fn test_added_fields_accept_merged_data() {
    let harness = TestHarness::new();
    harness.seed().await;

    let extended = harness
        .declaration()
        .field(FieldSpec::new("AddedField1", DomainType::String).searchable().filterable())
        .field(FieldSpec::new("AddedField2", DomainType::String).searchable().filterable())
        .suggester(Suggester::new("sgAdded", ["AddedField1", "AddedField2"]));
    harness.engine.ensure_index(&extended).await.unwrap();

    let update = Document::new()
        .with("RowKey", "1")
        .with("AddedField1", "UpdatedCoke");
    harness
        .engine
        .update_fields_atomic(&harness.index, update)
        .await
        .unwrap();

    let page = harness
        .engine
        .search(&harness.index, &SearchRequest::new("UpdatedCoke"))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    let doc = &page.documents[0];
    assert_eq!(doc.get("Brand").and_then(|v| v.as_str()), Some("Coke"));
    assert_eq!(doc.get("ProductName").and_then(|v| v.as_str()), Some("Coke Classic"));
}

#[tokio::test]
async fn test_unknown_field_then_add_field_then_retry() {
    let harness = TestHarness::new();
    harness.seed().await;

    let update = Document::new().with("RowKey", "2").with("Color", "Green");
    let err = harness
        .engine
        .update_fields_atomic(&harness.index, update.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "Color"));

    harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("Color", DomainType::String))
        .await
        .unwrap();
    harness
        .engine
        .update_fields_atomic(&harness.index, update)
        .await
        .unwrap();

    let doc = harness
        .engine
        .get_document(&harness.index, "2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("Color").and_then(|v| v.as_str()), Some("Green"));
}

#[tokio::test]
async fn test_add_field_survives_injected_conflicts() {
    let harness = TestHarness::new();
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    harness
        .service
        .fail_next(
            Operation::CreateOrUpdateIndex,
            std::iter::repeat_n(
                ServiceError::VersionConflict {
                    index: harness.index.clone(),
                },
                3,
            ),
        )
        .await;

    let field = harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("Notes", DomainType::String))
        .await
        .unwrap();
    assert_eq!(field.name, "Notes");
}

#[tokio::test]
async fn test_add_field_conflict_cap_from_config() {
    let harness = TestHarness::with_config(EngineConfig {
        schema_conflict_max_attempts: Some(2),
        ..EngineConfig::default()
    });
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    harness
        .service
        .fail_next(
            Operation::CreateOrUpdateIndex,
            std::iter::repeat_n(
                ServiceError::VersionConflict {
                    index: harness.index.clone(),
                },
                3,
            ),
        )
        .await;

    let err = harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("Notes", DomainType::String))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConflictRetriesExhausted { attempts: 2, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_field_keeps_every_field() {
    let harness = TestHarness::new();
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = harness.engine.clone();
            let index = harness.index.clone();
            tokio::spawn(async move {
                engine
                    .add_field(&index, &FieldSpec::new(format!("Extra{i}"), DomainType::Int32))
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    let fields = harness.engine.fields_of(&harness.index).await.unwrap();
    assert_eq!(fields.len(), 13);
    for i in 0..8 {
        assert_eq!(fields.get(&format!("Extra{i}")), Some(&DomainType::Int32));
    }
}

#[tokio::test]
async fn test_add_field_to_missing_index_creates_it() {
    let harness = TestHarness::new();
    harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("RowKey", DomainType::String).key())
        .await
        .unwrap();
    harness
        .engine
        .add_field(&harness.index, &FieldSpec::new("Brand", DomainType::String))
        .await
        .unwrap();

    let fields = harness.engine.fields_of(&harness.index).await.unwrap();
    assert_eq!(fields.len(), 2);
}

#[tokio::test]
async fn test_declaration_from_toml() {
    let harness = TestHarness::new();
    let text = format!(
        r#"
name = "{}"

[[fields]]
name = "RowKey"
type = "string"
key = true

[[fields]]
name = "Launched"
type = "timestamp"
filterable = true

[[suggesters]]
name = "sg"
source_fields = ["RowKey"]
"#,
        harness.index
    );
    let declaration = IndexDeclaration::from_toml_str(&text).unwrap();
    harness.engine.ensure_index(&declaration).await.unwrap();

    let fields = harness.engine.fields_of(&harness.index).await.unwrap();
    assert_eq!(fields.get("Launched"), Some(&DomainType::Timestamp));
}

#[tokio::test]
async fn test_delete_index_is_idempotent() {
    let harness = TestHarness::new();
    harness.seed().await;

    assert!(harness.engine.delete_index(&harness.index).await.unwrap());
    assert!(harness.engine.delete_index(&harness.index).await.unwrap());
    assert!(
        !harness
            .engine
            .schema()
            .index_exists(&harness.index)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_ensure_index_rejects_invalid_declaration() {
    let harness = TestHarness::new();
    let declaration = product_declaration(&harness.index)
        .suggester(Suggester::new("broken", ["DoesNotExist"]));

    let err = harness.engine.ensure_index(&declaration).await.unwrap_err();
    assert!(matches!(err, Error::InvalidDeclaration { .. }));
    assert_eq!(harness.service.calls(Operation::CreateOrUpdateIndex).await, 0);
}
