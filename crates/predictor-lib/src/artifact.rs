//! Artifact loading with optional checksum validation

use crate::error::LoadError;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// A deserialized artifact together with the SHA256 of its bytes
#[derive(Debug, Clone)]
pub struct LoadedArtifact<T> {
    pub value: T,
    pub checksum: String,
    pub size_bytes: usize,
}

/// Read and deserialize a JSON artifact.
///
/// When `expected_checksum` is given the file's SHA256 must match it
/// (case-insensitive hex) before parsing is attempted.
pub fn load_json<T: DeserializeOwned>(
    path: &Path,
    expected_checksum: Option<&str>,
) -> Result<LoadedArtifact<T>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let checksum = compute_checksum(&bytes);
    if let Some(expected) = expected_checksum {
        if !expected.trim().eq_ignore_ascii_case(&checksum) {
            return Err(LoadError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.trim().to_string(),
                actual: checksum,
            });
        }
        debug!(path = ?path, checksum = %checksum, "Artifact checksum validated");
    }

    let value = serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        path = ?path,
        size = bytes.len(),
        checksum = %checksum,
        "Artifact loaded"
    );

    Ok(LoadedArtifact {
        value,
        checksum,
        size_bytes: bytes.len(),
    })
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
