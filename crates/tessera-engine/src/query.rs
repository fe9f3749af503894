//! Query Engine: searches with filters, facets, and paging.
//!
//! A request with `top` or `skip` is answered by exactly one transport page.
//! Any other request is walked across every continuation page; documents are
//! concatenated and facet counts summed.

use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};
use tessera_core::{
    ContinuationToken, Error, RemoteIndexService, ResourceKind, Result, SearchPage, SearchRequest,
    SearchResponse, ServiceError,
};

use crate::detail::is_filter_rejection;

/// Position in a continuation walk.
#[derive(Debug, Clone)]
enum PageCursor {
    Start,
    Next(ContinuationToken),
    Done,
}

/// Runs searches against one service.
#[derive(Clone)]
pub struct QueryEngine {
    service: Arc<dyn RemoteIndexService>,
}

impl QueryEngine {
    /// Create an engine over an injected service client.
    pub fn new(service: Arc<dyn RemoteIndexService>) -> Self {
        Self { service }
    }

    /// Run a search and collect the caller-visible page.
    ///
    /// The facet map only holds fields named in `request.facets`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFilter`] if the service rejects the filter; never retried
    /// - [`Error::IndexNotFound`] if the index does not exist
    pub async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchPage> {
        let mut page = if request.is_paged() {
            let response = self.next_page(index, request, PageCursor::Start).await?;
            response.map(|(response, _)| SearchPage::from(response)).unwrap_or_default()
        } else {
            self.pages(index, request)
                .try_fold(SearchPage::default(), |mut page, response| async move {
                    page.absorb(response);
                    Ok::<_, Error>(page)
                })
                .await?
        };

        page.facets.retain_fields(&request.facets);
        log::debug!(
            "Search on '{index}' returned {} documents ({} facet fields)",
            page.len(),
            page.facets.len()
        );
        Ok(page)
    }

    /// Stream the transport pages of a query in order.
    ///
    /// The stream ends after the page without a continuation token. Dropping
    /// it stops the walk; no further pages are requested.
    pub fn pages<'a>(
        &'a self,
        index: &'a str,
        request: &'a SearchRequest,
    ) -> impl Stream<Item = Result<SearchResponse>> + 'a {
        stream::try_unfold(PageCursor::Start, move |cursor| {
            self.next_page(index, request, cursor)
        })
    }

    async fn next_page(
        &self,
        index: &str,
        request: &SearchRequest,
        cursor: PageCursor,
    ) -> Result<Option<(SearchResponse, PageCursor)>> {
        let response = match cursor {
            PageCursor::Start => {
                log::debug!("Searching '{index}' for '{}'", request.query);
                self.service.search(index, request).await
            }
            PageCursor::Next(token) => {
                log::debug!("Fetching next page of '{index}' search");
                self.service.continue_search(index, &token).await
            }
            PageCursor::Done => return Ok(None),
        }
        .map_err(|e| search_error(index, request, e))?;

        let next = match (&response.continuation, request.is_paged()) {
            (Some(token), false) => PageCursor::Next(token.clone()),
            _ => PageCursor::Done,
        };
        Ok(Some((response, next)))
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("service", &self.service.name())
            .finish()
    }
}

fn search_error(index: &str, request: &SearchRequest, err: ServiceError) -> Error {
    if let Some(filter) = &request.filter {
        if is_filter_rejection(&err) {
            return Error::InvalidFilter {
                filter: filter.clone(),
                message: err.detail().unwrap_or_default().to_string(),
            };
        }
    }
    if err.is_not_found_of(ResourceKind::Index) {
        return Error::IndexNotFound {
            index: index.to_string(),
        };
    }
    Error::Service(err)
}

// ============================================================================
// Tests
// ============================================================================
