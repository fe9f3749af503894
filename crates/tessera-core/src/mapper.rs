//! Domain type ⇄ wire type mapping.
//!
//! The mapping is lossy in one direction: `Float32` and `Decimal` both widen
//! to `Edm.Double`, and `Edm.Double` maps back to `Float64`. Callers must not
//! rely on exact decimal round-tripping through a remote schema.
//!
//! | Domain | Wire |
//! |--------|------|
//! | `String` | `Edm.String` |
//! | `Int32` | `Edm.Int32` |
//! | `Int64` | `Edm.Int64` |
//! | `Float32`, `Float64`, `Decimal` | `Edm.Double` |
//! | `Bool` | `Edm.Boolean` |
//! | `Timestamp` | `Edm.DateTimeOffset` |

use crate::error::{Error, Result};
use crate::types::{DomainType, WireType};

/// Map a declared domain type to the service's wire type.
pub fn to_wire_type(domain: DomainType) -> WireType {
    match domain {
        DomainType::String => WireType::String,
        DomainType::Int32 => WireType::Int32,
        DomainType::Int64 => WireType::Int64,
        DomainType::Float32 | DomainType::Float64 | DomainType::Decimal => WireType::Double,
        DomainType::Bool => WireType::Boolean,
        DomainType::Timestamp => WireType::DateTimeOffset,
    }
}

/// Map a wire type back to a domain type.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] for wire types with no domain
/// counterpart (geography points, collections).
pub fn to_domain_type(wire: WireType) -> Result<DomainType> {
    match wire {
        WireType::String => Ok(DomainType::String),
        WireType::Int32 => Ok(DomainType::Int32),
        WireType::Int64 => Ok(DomainType::Int64),
        WireType::Double => Ok(DomainType::Float64),
        WireType::Boolean => Ok(DomainType::Bool),
        WireType::DateTimeOffset => Ok(DomainType::Timestamp),
        WireType::GeographyPoint | WireType::StringCollection => {
            Err(Error::unsupported(wire.to_string()))
        }
    }
}
