//! In-process implementation of the Tessera remote index service.
//!
//! [`InMemoryIndexService`] keeps index schemas and documents in memory and
//! mirrors the remote service's observable behavior closely enough to drive
//! the engine end to end: version-token conflicts, per-item batch failures,
//! continuation-token paging, filters, facets, and suggesters.
//!
//! Queued faults ([`InMemoryIndexService::fail_next`]) and call counters
//! ([`InMemoryIndexService::calls`]) make retry behavior observable in tests.

pub mod filter;
mod service;
mod text;

pub use filter::FilterError;
pub use service::{DEFAULT_PAGE_SIZE, DEFAULT_TOP, InMemoryIndexService, Operation};
