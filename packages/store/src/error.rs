//! Store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid dashboard config: {0}")]
    Toml(#[from] toml::de::Error),
}
