//! Index schemas, suggesters, and caller-side index declarations.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::field::{FieldDefinition, FieldSpec};

// ============================================================================
// VersionToken
// ============================================================================

/// Opaque optimistic-concurrency token (an ETag on most services).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Suggester
// ============================================================================

/// A named typeahead configuration over source fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggester {
    /// Suggester name.
    pub name: String,
    /// Ordered source field names.
    pub source_fields: Vec<String>,
}

impl Suggester {
    /// Create a suggester over the given source fields.
    pub fn new<I, S>(name: impl Into<String>, source_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            source_fields: source_fields.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// IndexSchema
// ============================================================================

/// A remote index schema, as fetched from or submitted to the service.
///
/// Fields are appended over the life of an index and never removed in
/// normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Ordered field definitions.
    pub fields: Vec<FieldDefinition>,
    /// Suggesters.
    #[serde(default)]
    pub suggesters: Vec<Suggester>,
    /// Version token; `None` for schemas not yet stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
}

impl IndexSchema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            suggesters: Vec::new(),
            version: None,
        }
    }

    /// Append a field.
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a suggester.
    pub fn with_suggester(mut self, suggester: Suggester) -> Self {
        self.suggesters.push(suggester);
        self
    }

    /// Look up a field by name (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.matches_name(name))
    }

    /// The key field, if one is defined.
    pub fn key_field(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key)
    }

    /// Look up a suggester by name (case-insensitive).
    pub fn suggester(&self, name: &str) -> Option<&Suggester> {
        self.suggesters
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Compare fields and suggesters, ignoring the version token.
    pub fn same_shape(&self, other: &IndexSchema) -> bool {
        self.name == other.name
            && self.fields == other.fields
            && self.suggesters == other.suggesters
    }

    /// Check the structural invariants every stored schema must satisfy.
    ///
    /// - field names are non-empty and case-insensitively unique
    /// - at most one field is the key
    /// - every suggester source field exists
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::declaration("index name must not be empty"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(Error::declaration(format!(
                    "index '{}' has a field with an empty name",
                    self.name
                )));
            }
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(Error::declaration(format!(
                    "index '{}' declares field '{}' more than once",
                    self.name, field.name
                )));
            }
        }

        let keys: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.key)
            .map(|f| f.name.as_str())
            .collect();
        if keys.len() > 1 {
            return Err(Error::declaration(format!(
                "index '{}' declares more than one key field: {}",
                self.name,
                keys.join(", ")
            )));
        }

        let mut suggester_names = HashSet::new();
        for suggester in &self.suggesters {
            if !suggester_names.insert(suggester.name.to_ascii_lowercase()) {
                return Err(Error::declaration(format!(
                    "index '{}' declares suggester '{}' more than once",
                    self.name, suggester.name
                )));
            }
            if suggester.source_fields.is_empty() {
                return Err(Error::declaration(format!(
                    "suggester '{}' has no source fields",
                    suggester.name
                )));
            }
            if let Some(missing) = suggester
                .source_fields
                .iter()
                .find(|source| self.field(source).is_none())
            {
                return Err(Error::declaration(format!(
                    "suggester '{}' references unknown field '{missing}'",
                    suggester.name
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// IndexDeclaration
// ============================================================================

/// The caller's desired shape for an index.
///
/// Built directly or loaded from TOML:
///
/// ```toml
/// name = "products"
///
/// [[fields]]
/// name = "RowKey"
/// type = "string"
/// key = true
///
/// [[fields]]
/// name = "ProductName"
/// type = "string"
/// searchable = true
///
/// [[suggesters]]
/// name = "sg"
/// source_fields = ["RowKey", "ProductName"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeclaration {
    /// Index name.
    pub name: String,
    /// Ordered field declarations.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Suggester declarations.
    #[serde(default)]
    pub suggesters: Vec<Suggester>,
}

impl IndexDeclaration {
    /// Start an empty declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            suggesters: Vec::new(),
        }
    }

    /// Append a field declaration.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Append a suggester declaration.
    pub fn suggester(mut self, suggester: Suggester) -> Self {
        self.suggesters.push(suggester);
        self
    }

    /// Parse a declaration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let declaration: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse index declaration: {e}")))?;
        declaration.validate()?;
        Ok(declaration)
    }

    /// Load a declaration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Validate without building the wire schema.
    pub fn validate(&self) -> Result<()> {
        self.to_schema().map(|_| ())
    }

    /// Build the wire-typed schema this declaration describes.
    pub fn to_schema(&self) -> Result<IndexSchema> {
        let schema = IndexSchema {
            name: self.name.clone(),
            fields: self.fields.iter().map(FieldSpec::to_definition).collect(),
            suggesters: self.suggesters.clone(),
            version: None,
        };
        schema.validate()?;
        Ok(schema)
    }
}

// ============================================================================
// Tests
// ============================================================================
