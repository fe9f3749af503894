//! Field types and definitions.
//!
//! Two views of a field exist:
//!
//! - [`FieldSpec`]: what a caller declares, typed with a [`DomainType`]
//! - [`FieldDefinition`]: what the remote schema stores, typed with a [`WireType`]
//!
//! [`crate::mapper`] converts between the two type systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapper;

// ============================================================================
// DomainType
// ============================================================================

/// Value types callers declare fields with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DomainType {
    /// UTF-8 text.
    String,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Single-precision float; widened to the wire floating type.
    Float32,
    /// Double-precision float.
    Float64,
    /// Decimal; stored as the wire floating type, so precision is lost.
    Decimal,
    /// Boolean.
    Bool,
    /// Point in time with offset.
    Timestamp,
}

impl DomainType {
    /// Canonical lowercase name, as accepted in declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Decimal => "decimal",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(Self::String),
            "int32" | "i32" | "int" => Ok(Self::Int32),
            "int64" | "i64" | "long" => Ok(Self::Int64),
            "float32" | "f32" | "single" => Ok(Self::Float32),
            "float64" | "f64" | "double" => Ok(Self::Float64),
            "decimal" => Ok(Self::Decimal),
            "bool" | "boolean" => Ok(Self::Bool),
            "timestamp" | "datetime" | "datetimeoffset" => Ok(Self::Timestamp),
            _ => Err(Error::unsupported(s)),
        }
    }
}

impl TryFrom<String> for DomainType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DomainType> for String {
    fn from(value: DomainType) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// WireType
// ============================================================================

/// The remote service's field type enum.
///
/// Includes types the engine cannot map back to a [`DomainType`];
/// [`mapper::to_domain_type`] rejects those with `UnsupportedType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    /// `Edm.String`
    #[serde(rename = "Edm.String")]
    String,
    /// `Edm.Int32`
    #[serde(rename = "Edm.Int32")]
    Int32,
    /// `Edm.Int64`
    #[serde(rename = "Edm.Int64")]
    Int64,
    /// `Edm.Double`
    #[serde(rename = "Edm.Double")]
    Double,
    /// `Edm.Boolean`
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    /// `Edm.DateTimeOffset`
    #[serde(rename = "Edm.DateTimeOffset")]
    DateTimeOffset,
    /// `Edm.GeographyPoint`
    #[serde(rename = "Edm.GeographyPoint")]
    GeographyPoint,
    /// `Collection(Edm.String)`
    #[serde(rename = "Collection(Edm.String)")]
    StringCollection,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "Edm.String",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::Double => "Edm.Double",
            Self::Boolean => "Edm.Boolean",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::GeographyPoint => "Edm.GeographyPoint",
            Self::StringCollection => "Collection(Edm.String)",
        };
        f.write_str(name)
    }
}

// ============================================================================
// FieldSpec
// ============================================================================

fn default_true() -> bool {
    true
}

/// A caller-side field declaration.
///
/// Capability flags default to off, except `retrievable`, which defaults to
/// on. Use the builder-style methods to switch them:
///
/// ```rust
/// use tessera_core::{DomainType, FieldSpec};
///
/// let brand = FieldSpec::new("Brand", DomainType::String)
///     .searchable()
///     .filterable()
///     .facetable();
/// assert!(brand.facetable);
/// assert!(brand.retrievable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, case-insensitively unique within an index.
    pub name: String,

    /// Declared value type.
    #[serde(rename = "type")]
    pub domain_type: DomainType,

    /// Whether this is the document key.
    #[serde(default)]
    pub key: bool,

    /// Whether full-text search covers this field.
    #[serde(default)]
    pub searchable: bool,

    /// Whether filter expressions may reference this field.
    #[serde(default)]
    pub filterable: bool,

    /// Whether results may be ordered by this field.
    #[serde(default)]
    pub sortable: bool,

    /// Whether facet counts may be requested on this field.
    #[serde(default)]
    pub facetable: bool,

    /// Whether the field is returned in results.
    #[serde(default = "default_true")]
    pub retrievable: bool,
}

impl FieldSpec {
    /// Create a retrievable field with every other capability switched off.
    pub fn new(name: impl Into<String>, domain_type: DomainType) -> Self {
        Self {
            name: name.into(),
            domain_type,
            key: false,
            searchable: false,
            filterable: false,
            sortable: false,
            facetable: false,
            retrievable: true,
        }
    }

    /// Mark as the document key.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Enable full-text search.
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Enable filtering.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Enable sorting.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Enable facet counts.
    pub fn facetable(mut self) -> Self {
        self.facetable = true;
        self
    }

    /// Exclude from returned documents.
    pub fn hidden(mut self) -> Self {
        self.retrievable = false;
        self
    }

    /// Convert into the wire-typed definition stored in a schema.
    pub fn to_definition(&self) -> FieldDefinition {
        FieldDefinition {
            name: self.name.clone(),
            wire_type: mapper::to_wire_type(self.domain_type),
            key: self.key,
            searchable: self.searchable,
            filterable: self.filterable,
            sortable: self.sortable,
            facetable: self.facetable,
            retrievable: self.retrievable,
        }
    }
}

// ============================================================================
// FieldDefinition
// ============================================================================

/// A field as stored in a remote index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// Wire type.
    #[serde(rename = "type")]
    pub wire_type: WireType,
    /// Document key flag.
    pub key: bool,
    /// Full-text search flag.
    pub searchable: bool,
    /// Filter flag.
    pub filterable: bool,
    /// Sort flag.
    pub sortable: bool,
    /// Facet flag.
    pub facetable: bool,
    /// Retrievable flag.
    pub retrievable: bool,
}

impl FieldDefinition {
    /// Case-insensitive name comparison, as index field names are matched.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Map the wire type back to a domain type.
    pub fn domain_type(&self) -> Result<DomainType> {
        mapper::to_domain_type(self.wire_type)
    }
}

// ============================================================================
// Tests
// ============================================================================
