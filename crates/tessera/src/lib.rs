//! Tessera index management and query engine, umbrella crate.
//!
//! This crate re-exports all Tessera components for convenience. The
//! in-process service implementation is behind the `memory` feature.

pub use tessera_core as core;
pub use tessera_engine as engine;

pub use tessera_core::{EngineConfig, Error, IndexDeclaration, RemoteIndexService, Result};
pub use tessera_engine::SearchEngine;

#[cfg(feature = "memory")]
pub use tessera_memory as memory;
