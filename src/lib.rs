// Company Registry - Core Library
// Bulk CSV import into a keyed company store, plus keyword suggestions and search.
// Exposes all modules for use in CLI, API server, and tests

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

pub mod buffer;
pub mod company;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod search;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use buffer::{Batch, DedupBuffer, DEFAULT_BUFFER_THRESHOLD};
pub use company::{normalize, Company, CompanyRow};
pub use config::{ImportConfig, RegistryConfig, SearchConfig, ServerConfig};
pub use db::{setup_database, SqliteStore};
pub use error::{ConfigError, ImportError, RegistryError, StoreError};
pub use import::{
    import_from_file, BatchCommitter, BatchStats, ImportCoordinator, ImportOptions, ImportResult,
    ImportTotals,
};
pub use search::{CompanySearch, Page, Suggestion, SuggestionAggregator, SuggestionKind};
pub use store::{CompanyField, CreatedAtPolicy, RecordStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this twice is
/// an error because the global subscriber can only be installed once.
pub fn init_logging(level: impl Into<LevelFilter>) -> error::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.into().to_string()))
        .map_err(|e| RegistryError::InitLogging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| RegistryError::InitLogging(e.to_string()))
}
