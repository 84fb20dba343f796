use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An ingestion run is already in progress")]
    RunInProgress,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
