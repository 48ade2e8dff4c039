use std::{fs, io, path};

use crate::{Storage, StorageError};

const FILE_EXTENSION: &str = "json";

/// File-backed [`Storage`]: each key is a `<key>.json` file under `root`.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write never leaves a truncated value behind.
pub struct JsonFileStorage {
    root: path::PathBuf,
}

impl JsonFileStorage {
    /// Open an existing, writable directory as storage.
    pub fn new(root: path::PathBuf) -> Result<JsonFileStorage, StorageError> {
        let attr = fs::metadata(&root).map_err(|error| StorageError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;

        if !attr.is_dir() {
            return Err(StorageError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root path must be a directory."),
            });
        }

        if attr.permissions().readonly() {
            return Err(StorageError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root directory must be writable"),
            });
        }

        match root.canonicalize() {
            Ok(root) => Ok(JsonFileStorage { root }),
            Err(error) => Err(StorageError::RootPathInvalid { path: root, error }),
        }
    }

    /// Create `root` (and parents) if needed, then open it.
    pub fn create(root: path::PathBuf) -> Result<JsonFileStorage, StorageError> {
        fs::create_dir_all(&root).map_err(|error| StorageError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;
        Self::new(root)
    }

    pub fn root(&self) -> &path::Path {
        &self.root
    }

    fn key_to_file_path(&self, key: &str) -> Result<path::PathBuf, StorageError> {
        if key.is_empty() || key == "." || key == ".." {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                message: "must be a non-empty file name".to_string(),
            });
        }
        if key.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                message: "must not contain path separators".to_string(),
            });
        }
        Ok(self.root.join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file_path = self.key_to_file_path(key)?;
        tracing::debug!(path = %file_path.display(), "Reading stored value");

        match fs::read_to_string(&file_path) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::Io {
                key: key.to_string(),
                error,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let file_path = self.key_to_file_path(key)?;
        let tmp_path = file_path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        tracing::debug!(path = %file_path.display(), "Writing stored value");

        let io_error = |error| StorageError::Io {
            key: key.to_string(),
            error,
        };
        fs::write(&tmp_path, value.as_bytes()).map_err(io_error)?;
        fs::rename(&tmp_path, &file_path).map_err(io_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.key_to_file_path(key)?;
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::Io {
                key: key.to_string(),
                error,
            }),
        }
    }
}
