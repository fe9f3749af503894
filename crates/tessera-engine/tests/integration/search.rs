//! Integration tests for filtered, faceted, and paged search.

use futures::StreamExt;
use tessera_core::{Error, SearchRequest};
use tessera_memory::Operation;

use crate::common::{TestHarness, keys_of};

#[tokio::test]
async fn test_facet_counts() {
    let harness = TestHarness::with_page_size(3);
    harness.seed().await;

    let request = SearchRequest::new("*").with_facet("Brand");
    let page = harness.engine.search(&harness.index, &request).await.unwrap();

    assert_eq!(page.len(), 8);
    assert_eq!(page.facets.count("Brand", "Coke"), 4);
    assert_eq!(page.facets.count("Brand", "Pepsi"), 3);
    assert_eq!(page.facets.count("Brand", "NeHi"), 1);
}

#[tokio::test]
async fn test_filtered_facet_counts() {
    let harness = TestHarness::new();
    harness.seed().await;

    let request = SearchRequest::new("*")
        .with_filter("Brand eq 'Pepsi'")
        .with_facet("Brand");
    let page = harness.engine.search(&harness.index, &request).await.unwrap();

    let brands = page.facets.get("Brand").unwrap();
    assert_eq!(brands.len(), 1);
    assert_eq!(page.facets.count("Brand", "Pepsi"), 3);
}

#[tokio::test]
async fn test_numeric_facets_and_range_filter() {
    let harness = TestHarness::new();
    harness.seed().await;

    let request = SearchRequest::new("*")
        .with_filter("Cost ge 200 and Cost lt 300")
        .with_facet("Cost")
        .with_total_count();
    let page = harness.engine.search(&harness.index, &request).await.unwrap();

    assert_eq!(keys_of(&page.documents), vec!["3", "5", "6"]);
    assert_eq!(page.total_count, Some(3));
    assert_eq!(page.facets.count("Cost", "201"), 1);
    assert_eq!(page.facets.count("Cost", "100"), 0);
}

#[tokio::test]
async fn test_explicit_paging_partitions_results() {
    let harness = TestHarness::new();
    harness.seed().await;

    let first = harness
        .engine
        .search(
            &harness.index,
            &SearchRequest::new("*").with_top(5).with_total_count(),
        )
        .await
        .unwrap();
    let second = harness
        .engine
        .search(
            &harness.index,
            &SearchRequest::new("*").with_top(5).with_skip(5).with_total_count(),
        )
        .await
        .unwrap();

    assert_eq!(first.len(), 5);
    assert_eq!(first.total_count, Some(8));
    assert_eq!(second.len(), 3);

    let first_keys = keys_of(&first.documents);
    let second_keys = keys_of(&second.documents);
    assert!(first_keys.iter().all(|k| !second_keys.contains(k)));

    let union = [first.documents, second.documents].concat();
    assert_eq!(keys_of(&union), vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
}

#[tokio::test]
async fn test_explicit_paging_never_follows_continuations() {
    let harness = TestHarness::with_page_size(2);
    harness.seed().await;

    let page = harness
        .engine
        .search(&harness.index, &SearchRequest::new("*").with_top(5))
        .await
        .unwrap();
    assert_eq!(page.len(), 5);
    assert_eq!(harness.service.calls(Operation::ContinueSearch).await, 0);
}

#[tokio::test]
async fn test_full_walk_follows_every_continuation() {
    let harness = TestHarness::with_page_size(3);
    harness.seed().await;

    let page = harness
        .engine
        .search(&harness.index, &SearchRequest::new("*").with_total_count())
        .await
        .unwrap();
    assert_eq!(page.len(), 8);
    assert_eq!(page.total_count, Some(8));
    assert_eq!(harness.service.calls(Operation::ContinueSearch).await, 2);
}

#[tokio::test]
async fn test_page_stream_can_stop_early() {
    let harness = TestHarness::with_page_size(3);
    harness.seed().await;

    let request = SearchRequest::new("*");
    let mut pages = Box::pin(harness.engine.query().pages(&harness.index, &request));
    let first = pages.next().await.unwrap().unwrap();
    drop(pages);

    assert_eq!(first.documents.len(), 3);
    assert!(first.continuation.is_some());
    assert_eq!(harness.service.calls(Operation::ContinueSearch).await, 0);
}

#[tokio::test]
async fn test_bad_filter_is_permanent() {
    let harness = TestHarness::new();
    harness.seed().await;
    harness.service.reset_calls().await;

    let request = SearchRequest::new("*").with_filter("Brand eq 'Coke' and");
    let err = harness
        .engine
        .search(&harness.index, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidFilter { .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.status(), Some(400));
    assert_eq!(harness.service.calls(Operation::Search).await, 1);
}

#[tokio::test]
async fn test_filter_on_unknown_field() {
    let harness = TestHarness::new();
    harness.seed().await;

    let request = SearchRequest::new("*").with_filter("Color eq 'Red'");
    let err = harness
        .engine
        .search(&harness.index, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter { ref message, .. } if message.contains("Color")));
}

#[tokio::test]
async fn test_search_missing_index() {
    let harness = TestHarness::new();
    let err = harness
        .engine
        .search(&harness.index, &SearchRequest::new("*"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }));
}
