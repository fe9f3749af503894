//! Integration tests for typeahead suggestions.

use tessera_core::{Document, DomainType, Error, FieldSpec, Suggester};

use crate::common::{TestHarness, keys_of};

#[tokio::test]
async fn test_fuzzy_suggest_for_coke() {
    let harness = TestHarness::new();
    harness.seed().await;

    let results = harness
        .engine
        .suggest(&harness.index, "sg", "Coke", 8, true, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(keys_of(&results), vec!["1", "3"]);
}

#[tokio::test]
async fn test_suggest_with_filter() {
    let harness = TestHarness::new();
    harness.seed().await;

    let results = harness
        .engine
        .suggest(&harness.index, "sg", "Diet", 8, false, Some("Brand eq 'Pepsi'"))
        .await
        .unwrap();
    assert_eq!(keys_of(&results), vec!["6"]);
}

#[tokio::test]
async fn test_suggest_respects_max_results() {
    let harness = TestHarness::new();
    harness.seed().await;

    let results = harness
        .engine
        .suggest(&harness.index, "sg", "Pepsi", 1, false, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_unknown_suggester() {
    let harness = TestHarness::new();
    harness.seed().await;

    let err = harness
        .engine
        .suggest(&harness.index, "nope", "Coke", 8, false, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownSuggester { ref index, ref suggester }
            if *index == harness.index && suggester == "nope"
    ));
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_second_suggester_over_added_fields() {
    let harness = TestHarness::new();
    harness.seed().await;

    let extended = harness
        .declaration()
        .field(FieldSpec::new("AddedField1", DomainType::String))
        .field(FieldSpec::new("AddedField2", DomainType::String))
        .suggester(Suggester::new("sgAdded", ["AddedField1", "AddedField2"]));
    harness.engine.ensure_index(&extended).await.unwrap();
    harness
        .engine
        .update_fields_atomic(
            &harness.index,
            Document::new().with("RowKey", "7").with("AddedField2", "Crystal"),
        )
        .await
        .unwrap();

    let results = harness
        .engine
        .suggest(&harness.index, "sgAdded", "Cry", 8, false, None)
        .await
        .unwrap();
    assert_eq!(keys_of(&results), vec!["7"]);
}
