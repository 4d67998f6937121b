//! On-disk document store for uploaded papers.
//!
//! Stored filenames are server-assigned (uuid v4 plus the original
//! extension) so user-supplied names never touch the filesystem.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;

/// Read access to stored document bytes, keyed by stored filename.
///
/// The worker consumes documents through this trait so tests can
/// substitute an in-memory source.
pub trait ByteSource: Send + Sync {
    fn read(&self, stored_filename: &str) -> Result<Vec<u8>, StorageError>;
}

pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes uploaded bytes under a fresh server-assigned filename and
    /// returns that filename. The extension of the original filename is
    /// preserved (lowercased) for later format detection.
    pub fn save(&self, original_filename: &str, content: &[u8]) -> Result<String, StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|e| StorageError::CreateDirectory {
            path: self.root.clone(),
            source: e,
        })?;

        let extension = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let stored = match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
            _ => Uuid::new_v4().to_string(),
        };

        let path = self.root.join(&stored);
        std::fs::write(&path, content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(stored)
    }

    fn resolve(&self, stored_filename: &str) -> Result<PathBuf, StorageError> {
        // Stored filenames are single path components; anything else is
        // a forged name, not something this store ever issued.
        let ok = !stored_filename.is_empty()
            && !stored_filename.contains('/')
            && !stored_filename.contains('\\')
            && !stored_filename.contains("..");
        if !ok {
            return Err(StorageError::InvalidName(stored_filename.to_string()));
        }
        Ok(self.root.join(stored_filename))
    }
}

impl ByteSource for DocumentStore {
    fn read(&self, stored_filename: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(stored_filename)?;
        if !path.exists() {
            return Err(StorageError::NotFound(stored_filename.to_string()));
        }
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }
}
