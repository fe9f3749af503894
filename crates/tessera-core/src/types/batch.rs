//! Document batch actions and per-item results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::document::{Document, FieldValue};

/// Action applied to every document in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchKind {
    /// Insert or fully replace documents.
    Upload,
    /// Update the supplied fields of existing documents.
    Merge,
    /// Merge if the document exists, upload otherwise.
    MergeOrUpload,
    /// Remove documents by key.
    Delete,
}

impl BatchKind {
    /// Lowercase action name used in messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Merge => "merge",
            Self::MergeOrUpload => "mergeOrUpload",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One batch of document actions sharing a single [`BatchKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    /// Action applied to every document.
    pub kind: BatchKind,
    /// Documents (for deletes, key-only documents).
    pub documents: Vec<Document>,
}

impl BatchOperation {
    /// Create a batch of the given kind.
    pub fn new(kind: BatchKind, documents: Vec<Document>) -> Self {
        Self { kind, documents }
    }

    /// Upload batch.
    pub fn upload(documents: Vec<Document>) -> Self {
        Self::new(BatchKind::Upload, documents)
    }

    /// Merge batch.
    pub fn merge(documents: Vec<Document>) -> Self {
        Self::new(BatchKind::Merge, documents)
    }

    /// Merge-or-upload batch.
    pub fn merge_or_upload(documents: Vec<Document>) -> Self {
        Self::new(BatchKind::MergeOrUpload, documents)
    }

    /// Delete batch built from raw key values.
    pub fn delete_keys<I, S>(key_field: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = keys
            .into_iter()
            .map(|key| Document::new().with(key_field, FieldValue::String(key.into())))
            .collect();
        Self::new(BatchKind::Delete, documents)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the batch carries no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Outcome of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Key of the document the item addressed.
    pub key: String,
    /// Whether the item was applied.
    pub succeeded: bool,
    /// HTTP-analogous status code.
    pub status: u16,
    /// Service detail for failed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ItemResult {
    /// A successfully applied item.
    pub fn succeeded(key: impl Into<String>, status: u16) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            status,
            message: None,
        }
    }

    /// A rejected item.
    pub fn failed(key: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: false,
            status,
            message: Some(message.into()),
        }
    }
}

/// Per-item outcomes of a fully applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// One entry per submitted document, in submission order.
    pub items: Vec<ItemResult>,
}

impl BatchResult {
    /// Wrap item results.
    pub fn new(items: Vec<ItemResult>) -> Self {
        Self { items }
    }

    /// Items the service rejected.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| !item.succeeded)
    }

    /// Whether every item was applied.
    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|item| item.succeeded)
    }
}
