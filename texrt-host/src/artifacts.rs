//! Module image and memory snapshot
//!
//! Both artifacts are normally stored gzip-compressed. Bytes starting with the
//! gzip magic are decompressed; anything else is taken as-is.

use crate::error::SessionError;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decoded artifacts, ready to load into a session
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// Wasm (or WAT) bytes of the module
    pub image: Vec<u8>,

    /// Initial contents of the memory region
    pub snapshot: Vec<u8>,
}

impl Artifacts {
    /// Wrap already-decoded bytes
    pub fn new(image: impl Into<Vec<u8>>, snapshot: impl Into<Vec<u8>>) -> Self {
        Self {
            image: image.into(),
            snapshot: snapshot.into(),
        }
    }

    /// Decode artifacts that may still be compressed
    pub fn decode(image: &[u8], snapshot: &[u8]) -> Result<Self, SessionError> {
        Ok(Self {
            image: inflate("image", image)?,
            snapshot: inflate("snapshot", snapshot)?,
        })
    }

    /// Read and decode both artifacts from disk
    pub fn from_paths(image: &Path, snapshot: &Path) -> Result<Self, SessionError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| SessionError::ArtifactMissing {
                path: path.to_path_buf(),
                source,
            })
        };
        let artifacts = Self::decode(&read(image)?, &read(snapshot)?)?;
        tracing::info!(
            image = %image.display(),
            image_bytes = artifacts.image.len(),
            snapshot_bytes = artifacts.snapshot.len(),
            "Artifacts loaded"
        );
        Ok(artifacts)
    }
}

fn inflate(artifact: &'static str, bytes: &[u8]) -> Result<Vec<u8>, SessionError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|source| SessionError::Decompression { artifact, source })?;
    Ok(out)
}
