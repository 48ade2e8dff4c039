use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Storage root path invalid ({path}): {error}")]
    RootPathInvalid {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("I/O error on key '{key}': {error}")]
    Io {
        key: String,
        #[source]
        error: io::Error,
    },

    #[error("Invalid storage key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
