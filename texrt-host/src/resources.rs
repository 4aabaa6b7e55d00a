//! Resource store for files the module reads but the session did not stage
//!
//! Font metric files and similar resources are looked up lazily, the first time
//! the module opens a name that is neither staged in the overlay nor written
//! during the run. A store either returns the (decompressed) bytes or nothing;
//! the module learns about a miss through `erstat`, never through a trap.
//!
//! [`DirectoryStore`] serves files from a directory, preferring a gzip-compressed
//! `<name>.gz` over a plain `<name>`. Names are confined to the directory:
//! absolute names and `..` components are refused.

use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving a resource
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The name would resolve outside the store root
    #[error("Resource name '{0}' escapes the store root")]
    EscapesRoot(String),

    /// Reading the file failed
    #[error("Failed to read resource '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `.gz` file was not valid gzip data
    #[error("Failed to decompress resource '{path}': {source}")]
    Decompression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of files that are not staged in the overlay
pub trait ResourceStore: Send + Sync {
    /// Look up `name`, returning its bytes when found
    fn fetch(&self, name: &str) -> Option<Vec<u8>>;
}

/// A store that resolves nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStore;

impl ResourceStore for EmptyStore {
    fn fetch(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }
}

/// A store backed by a directory on the host file system
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` below the root, refusing anything that could escape it
    fn resolve(&self, name: &str) -> Result<PathBuf, ResourceError> {
        let relative = Path::new(name);
        let confined = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(ResourceError::EscapesRoot(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Load `name`, distinguishing "not found" from real failures
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ResourceError> {
        let path = self.resolve(name)?;

        let mut compressed = path.clone().into_os_string();
        compressed.push(".gz");
        let compressed = PathBuf::from(compressed);

        if let Some(bytes) = read_if_exists(&compressed)? {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|source| ResourceError::Decompression {
                    path: compressed.clone(),
                    source,
                })?;
            return Ok(Some(decoded));
        }

        read_if_exists(&path)
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, ResourceError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ResourceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ResourceStore for DirectoryStore {
    fn fetch(&self, name: &str) -> Option<Vec<u8>> {
        match self.load(name) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(name, error = %e, "Resource lookup failed");
                None
            }
        }
    }
}
