use thiserror::Error;

/// Result type used throughout rnadnatools.
pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Bad or conflicting command line options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Column, fill-value or rename counts (or types) that do not line up.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A key or column that has to exist is missing.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    #[error(transparent)]
    Fastx(#[from] needletail::errors::ParseError),
}

impl ToolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ToolError::Configuration(msg.into())
    }

    pub fn schema<S: Into<String>>(msg: S) -> Self {
        ToolError::SchemaMismatch(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ToolError::KeyNotFound(msg.into())
    }
}
