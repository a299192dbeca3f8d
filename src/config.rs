// ⚙️ Configuration - JSON file plus environment overrides

use crate::buffer::DEFAULT_BUFFER_THRESHOLD;
use crate::error::ConfigError;
use crate::import::ImportOptions;
use crate::store::CreatedAtPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV: &str = "COMPANY_REGISTRY_CONFIG";
pub const DATABASE_ENV: &str = "COMPANY_REGISTRY_DB";

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub buffer_threshold: usize,
    pub created_at_policy: CreatedAtPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            created_at_policy: CreatedAtPolicy::default(),
        }
    }
}

impl ImportConfig {
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            buffer_threshold: self.buffer_threshold,
        }
    }
}

/// Limits for suggestions and search pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Shorter queries get no suggestions (default: 2)
    pub min_query_length: usize,

    /// Values fetched per looked-up field (default: 5)
    pub suggestions_per_field: usize,

    /// Overall cap after merging (default: 10)
    pub max_suggestions: usize,

    /// Search/list page size (default: 20)
    pub per_page: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            min_query_length: 2,
            suggestions_per_field: 5,
            max_suggestions: 10,
            per_page: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

// ============================================================================
// REGISTRY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub database_path: PathBuf,
    pub import: ImportConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            database_path: PathBuf::from("companies.db"),
            import: ImportConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Load config from a JSON file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// File named by `COMPANY_REGISTRY_CONFIG` (or defaults), then env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                debug!(path = ?path, "loading config file");
                Self::from_file(PathBuf::from(path))?
            }
            None => Self::default(),
        };

        config.apply_overrides(std::env::var_os(DATABASE_ENV).map(PathBuf::from));
        Ok(config)
    }

    pub fn apply_overrides(&mut self, database_path: Option<PathBuf>) {
        if let Some(path) = database_path {
            self.database_path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.buffer_threshold == 0 {
            return Err(ConfigError::Invalid("import.buffer_threshold must be at least 1".to_string()));
        }
        if self.search.per_page == 0 {
            return Err(ConfigError::Invalid("search.per_page must be at least 1".to_string()));
        }
        if self.search.max_suggestions == 0 {
            return Err(ConfigError::Invalid("search.max_suggestions must be at least 1".to_string()));
        }
        Ok(())
    }
}
