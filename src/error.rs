use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("database operation failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("excel read failed: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("config parse failed: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unsupported tabular format: {0}")]
    UnsupportedFormat(String),

    #[error("fillin needs unique keys, {duplicates} duplicated rows on {keys:?}")]
    DuplicateKeys { keys: Vec<String>, duplicates: usize },

    #[error("fillin needs at least one key column")]
    NoKeys,

    #[error("missing column: {0}")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
