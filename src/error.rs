// Icon Cache Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IconCacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid component name: {0}")]
    InvalidComponent(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Icon provider error: {0}")]
    Provider(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for IconCacheError {
    fn from(err: anyhow::Error) -> Self {
        IconCacheError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IconCacheError>;
