//! Integration tests for document upload, partial update, and deletion.

use tessera_core::{BatchKind, Document, Error, SearchRequest, ServiceError};
use tessera_memory::Operation;

use crate::common::{TestHarness, keys_of, product, products};

#[tokio::test]
async fn test_uploaded_documents_round_trip_through_search() {
    let harness = TestHarness::new();
    harness.seed().await;

    let page = harness
        .engine
        .search(&harness.index, &SearchRequest::new("Coke"))
        .await
        .unwrap();

    assert_eq!(keys_of(&page.documents), vec!["1", "2", "3", "4"]);
    let expected: Vec<Document> = products().into_iter().take(4).collect();
    for doc in &page.documents {
        assert!(expected.contains(doc), "retrievable fields intact: {doc:?}");
    }
}

#[tokio::test]
async fn test_get_document_by_key() {
    let harness = TestHarness::new();
    harness.seed().await;

    let doc = harness
        .engine
        .get_document(&harness.index, "8")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc, product("8", "NeHi", "Grape", "323450", 300.0));
    assert!(
        harness
            .engine
            .get_document(&harness.index, "99")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_concurrent_atomic_updates_on_disjoint_fields() {
    let harness = TestHarness::new();
    harness.seed().await;

    let rename = Document::new()
        .with("RowKey", "5")
        .with("ProductName", "Pepsi Max");
    let reprice = Document::new().with("RowKey", "5").with("Cost", 250.0);
    let (renamed, repriced) = tokio::join!(
        harness.engine.update_fields_atomic(&harness.index, rename),
        harness.engine.update_fields_atomic(&harness.index, reprice),
    );
    assert!(renamed.unwrap());
    assert!(repriced.unwrap());

    let doc = harness
        .engine
        .get_document(&harness.index, "5")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("ProductName").and_then(|v| v.as_str()), Some("Pepsi Max"));
    assert_eq!(doc.get("Cost").and_then(|v| v.as_f64()), Some(250.0));
    assert_eq!(doc.get("Brand").and_then(|v| v.as_str()), Some("Pepsi"));
    assert_eq!(doc.get("Sku").and_then(|v| v.as_str()), Some("223450"));
}

#[tokio::test]
async fn test_delete_then_absent() {
    let harness = TestHarness::new();
    harness.seed().await;

    assert!(
        harness
            .engine
            .delete_by_keys(&harness.index, "RowKey", ["1", "2"])
            .await
            .unwrap()
    );
    for key in ["1", "2"] {
        assert!(
            harness
                .engine
                .get_document(&harness.index, key)
                .await
                .unwrap()
                .is_none()
        );
    }
    assert!(
        harness
            .engine
            .delete_by_keys(&harness.index, "RowKey", ["1", "2"])
            .await
            .unwrap()
    );
    assert_eq!(harness.service.document_count(&harness.index).await, Some(6));
}

#[tokio::test]
async fn test_delete_by_keys_with_lower_case_key_field() {
    let harness = TestHarness::new();
    harness.seed().await;

    assert!(
        harness
            .engine
            .delete_by_keys(&harness.index, "rowkey", ["1"])
            .await
            .unwrap()
    );
    assert!(
        harness
            .engine
            .get_document(&harness.index, "1")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(harness.service.document_count(&harness.index).await, Some(7));
}

#[tokio::test]
async fn test_timestamp_shaped_text_survives_json_round_trip() {
    let harness = TestHarness::new();
    harness.seed().await;

    let update: Document =
        serde_json::from_str(r#"{"RowKey":"1","ProductName":"2016-03-01T00:00:00Z"}"#).unwrap();
    assert!(
        harness
            .engine
            .update_fields_atomic(&harness.index, update)
            .await
            .unwrap()
    );

    let doc = harness
        .engine
        .get_document(&harness.index, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        doc.get("ProductName").and_then(|v| v.as_str()),
        Some("2016-03-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_delete_documents_resolves_key_field() {
    let harness = TestHarness::new();
    harness.seed().await;

    let pepsis: Vec<Document> = products().into_iter().skip(4).take(3).collect();
    harness
        .engine
        .delete_documents(&harness.index, &pepsis)
        .await
        .unwrap();

    let page = harness
        .engine
        .search(&harness.index, &SearchRequest::new("*"))
        .await
        .unwrap();
    assert_eq!(keys_of(&page.documents), vec!["1", "2", "3", "4", "8"]);
}

#[tokio::test]
async fn test_upsert_exhausts_retries_on_persistent_transient_failure() {
    let harness = TestHarness::new();
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    harness
        .service
        .fail_next(
            Operation::SubmitBatch,
            std::iter::repeat_n(ServiceError::transient(503, "Service Unavailable"), 20),
        )
        .await;

    let max_retries = 3;
    let err = harness
        .engine
        .batch()
        .upsert_batch(
            &harness.index,
            products(),
            || async { Ok::<_, Error>(true) },
            max_retries,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::RetriesExhausted { operation: BatchKind::Upload, attempts: 4, .. }
    ));
    assert!(err.to_string().contains("exceeded maximum allowable attempts"));
    assert_eq!(
        harness.service.calls(Operation::SubmitBatch).await,
        max_retries + 1
    );
}

#[tokio::test]
async fn test_upsert_recovers_from_partial_failure() {
    let harness = TestHarness::new();
    harness.engine.ensure_index(&harness.declaration()).await.unwrap();
    harness
        .service
        .fail_next(
            Operation::SubmitBatch,
            [ServiceError::PartialFailure {
                failed: vec![tessera_core::ItemResult::failed("3", 503, "Throttled")],
            }],
        )
        .await;

    assert!(
        harness
            .engine
            .upsert_batch(&harness.declaration(), products())
            .await
            .unwrap()
    );
    assert_eq!(harness.service.document_count(&harness.index).await, Some(8));
    assert_eq!(harness.service.calls(Operation::SubmitBatch).await, 2);
}

#[tokio::test]
async fn test_delete_exhausts_retries() {
    let harness = TestHarness::new();
    harness.seed().await;
    harness
        .service
        .fail_next(
            Operation::SubmitBatch,
            std::iter::repeat_n(ServiceError::transient(429, "Too Many Requests"), 10),
        )
        .await;

    let err = harness
        .engine
        .delete_by_keys(&harness.index, "RowKey", ["1"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RetriesExhausted { operation: BatchKind::Delete, attempts: 4, .. }
    ));
}

#[tokio::test]
async fn test_invalid_value_is_not_retried() {
    let harness = TestHarness::new();
    harness.seed().await;
    harness.service.reset_calls().await;

    let update = Document::new().with("RowKey", "1").with("Cost", "free");
    let err = harness
        .engine
        .update_fields_atomic(&harness.index, update)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
    assert_eq!(harness.service.calls(Operation::SubmitBatch).await, 1);
}

#[tokio::test]
async fn test_upsert_document_into_missing_index() {
    let harness = TestHarness::new();
    let err = harness
        .engine
        .upsert_document(&harness.index, product("1", "Coke", "Coke", "1", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }));
}
