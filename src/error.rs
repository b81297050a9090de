use crate::catalog::Locale;
use thiserror::Error;

/// Errors raised by keyrun components.
///
/// Storage and network failures are normally caught where they happen and
/// logged; they only reach callers that explicitly ask for them (export,
/// store construction, direct submission).
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server rejected result with status {0}")]
    Rejected(u16),

    #[error("no practice texts available for language {language}")]
    CatalogEmpty { language: Locale },

    #[error("no results to export")]
    NothingToExport,
}

pub type Result<T> = std::result::Result<T, Error>;
