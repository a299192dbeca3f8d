use thiserror::Error;

/// Failures raised by a [`RecordStore`](crate::store::RecordStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt timestamp in column {column}: {value}")]
    CorruptTimestamp { column: &'static str, value: String },
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Terminal failures of an import run.
///
/// Rows without a business key are not errors; they are skipped by the
/// normalizer and never show up here.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),
    #[error("Store commit failed: {0}")]
    StoreCommitFailed(#[source] StoreError),
}

impl ImportError {
    pub(crate) fn unreadable(err: impl std::fmt::Display) -> Self {
        ImportError::SourceUnreadable(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Init Logging error: {0}")]
    InitLogging(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
