use std::path::PathBuf;

use thiserror::Error;

/// Errors produced anywhere in the dashboard.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },

    #[error("no record with id {0}")]
    RecordNotFound(u64),

    #[error("column '{column}' not found in {source_name}")]
    MissingColumn { source_name: String, column: String },

    #[error("cannot plot '{value}' from column '{column}'")]
    NonPlottable { column: String, value: String },

    #[error("{0}")]
    Validation(String),

    #[error("'{0}' is already in the ticker list")]
    DuplicateTicker(String),

    #[error("unknown period '{0}'")]
    InvalidPeriod(String),

    #[error("unknown export format '{0}'")]
    InvalidFormat(String),

    #[error("no authentication source configured")]
    AuthNotConfigured,

    #[error("login required")]
    Unauthorized,

    #[error("rate limited while fetching {ticker}")]
    RateLimited { ticker: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[cfg(feature = "web")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
