//! Suggest Engine: typeahead completions from a named suggester.

use std::sync::Arc;

use tessera_core::{
    Document, Error, RemoteIndexService, ResourceKind, Result, ServiceError, SuggestParams,
};

use crate::detail::is_filter_rejection;

/// Fetches completion candidates. One round trip per call, no retry.
#[derive(Clone)]
pub struct SuggestEngine {
    service: Arc<dyn RemoteIndexService>,
}

impl SuggestEngine {
    /// Create an engine over an injected service client.
    pub fn new(service: Arc<dyn RemoteIndexService>) -> Self {
        Self { service }
    }

    /// Return up to `max_results` documents whose suggester fields complete `prefix`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownSuggester`] if `suggester` is not defined on the index
    /// - [`Error::IndexNotFound`] if the index does not exist
    /// - [`Error::InvalidFilter`] if the service rejects `filter`
    pub async fn suggest(
        &self,
        index: &str,
        suggester: &str,
        prefix: &str,
        max_results: usize,
        fuzzy: bool,
        filter: Option<&str>,
    ) -> Result<Vec<Document>> {
        let params = SuggestParams {
            top: max_results,
            fuzzy,
            filter: filter.map(str::to_string),
        };

        let results = self
            .service
            .suggest(index, suggester, prefix, &params)
            .await
            .map_err(|e| suggest_error(index, suggester, filter, e))?;
        log::debug!(
            "Suggester '{suggester}' on '{index}' returned {} candidates for '{prefix}'",
            results.len()
        );
        Ok(results)
    }
}

impl std::fmt::Debug for SuggestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestEngine")
            .field("service", &self.service.name())
            .finish()
    }
}

fn suggest_error(index: &str, suggester: &str, filter: Option<&str>, err: ServiceError) -> Error {
    if err.is_not_found_of(ResourceKind::Suggester) {
        return Error::UnknownSuggester {
            index: index.to_string(),
            suggester: suggester.to_string(),
        };
    }
    if err.is_not_found_of(ResourceKind::Index) {
        return Error::IndexNotFound {
            index: index.to_string(),
        };
    }
    if let Some(filter) = filter.filter(|_| is_filter_rejection(&err)) {
        return Error::InvalidFilter {
            filter: filter.to_string(),
            message: err.detail().unwrap_or_default().to_string(),
        };
    }
    Error::Service(err)
}
