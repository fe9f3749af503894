//! Engine configuration.
//!
//! [`EngineConfig`] holds the retry bounds and delays the engine applies.
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! max_batch_retries = 3
//! atomic_update_retries = 10
//! creation_delay_ms = 0
//! schema_conflict_backoff_ms = 50
//!
//! [service]
//! service_name = "contoso-search"
//! api_key = "..."
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity of the remote service a transport connects to.
///
/// The engine never reads these; they are validated here so a transport can
/// be built from the same config file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service account name.
    pub service_name: String,
    /// Admin API key.
    pub api_key: String,
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("service_name", &self.service_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ServiceSettings {
    /// Create service settings.
    pub fn new(service_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            api_key: api_key.into(),
        }
    }

    /// Both values must be non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::config("service_name must not be empty"));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::config("api_key must not be empty"));
        }
        Ok(())
    }
}

/// Retry bounds and delays for the engine components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Remote service identity, when the config also drives a transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSettings>,

    /// Extra submissions of a batch after a transient failure.
    #[serde(default = "default_max_batch_retries")]
    pub max_batch_retries: u32,

    /// Extra submissions of an atomic partial update after a transient failure.
    #[serde(default = "default_atomic_update_retries")]
    pub atomic_update_retries: u32,

    /// Wait after a successful `ensure_index`, in milliseconds.
    #[serde(default)]
    pub creation_delay_ms: u64,

    /// Cap on `add_field` version conflicts; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_conflict_max_attempts: Option<u32>,

    /// Wait between `add_field` conflict retries, in milliseconds.
    #[serde(default)]
    pub schema_conflict_backoff_ms: u64,
}

fn default_max_batch_retries() -> u32 {
    3
}

fn default_atomic_update_retries() -> u32 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service: None,
            max_batch_retries: default_max_batch_retries(),
            atomic_update_retries: default_atomic_update_retries(),
            creation_delay_ms: 0,
            schema_conflict_max_attempts: None,
            schema_conflict_backoff_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Validate service settings and attempt caps.
    pub fn validate(&self) -> Result<()> {
        if let Some(service) = &self.service {
            service.validate()?;
        }
        if self.schema_conflict_max_attempts == Some(0) {
            return Err(Error::config(
                "schema_conflict_max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    /// Builder-style service settings.
    pub fn with_service(mut self, service: ServiceSettings) -> Self {
        self.service = Some(service);
        self
    }

    /// Builder-style batch retry bound.
    pub fn with_max_batch_retries(mut self, retries: u32) -> Self {
        self.max_batch_retries = retries;
        self
    }

    /// Builder-style conflict attempt cap.
    pub fn with_schema_conflict_max_attempts(mut self, attempts: u32) -> Self {
        self.schema_conflict_max_attempts = Some(attempts);
        self
    }

    /// Wait applied after index creation.
    pub fn creation_delay(&self) -> Duration {
        Duration::from_millis(self.creation_delay_ms)
    }

    /// Wait applied between schema conflict retries.
    pub fn schema_conflict_backoff(&self) -> Duration {
        Duration::from_millis(self.schema_conflict_backoff_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
