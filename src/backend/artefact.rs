use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while checking a model artefact on disk.
#[derive(Debug, Error)]
pub enum ArtefactError {
    #[error("failed to read model artefact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artefact at {path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Locator for a classification model resolved by an external collaborator.
///
/// When `sha256` is present the file must hash to it before a session may be
/// bound; otherwise only its existence is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtefact {
    pub path: PathBuf,
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ModelArtefact {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sha256: None,
        }
    }

    #[must_use]
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Checks that the artefact exists and, if pinned, matches its digest.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be opened or read and
    /// `ChecksumMismatch` when the computed digest differs from `sha256`.
    pub fn verify(&self) -> Result<(), ArtefactError> {
        let Some(expected) = self.sha256.as_deref() else {
            return File::open(&self.path)
                .map(drop)
                .map_err(|source| ArtefactError::Io {
                    path: self.path.clone(),
                    source,
                });
        };
        let actual = compute_sha256(&self.path)?;
        let expected = normalise_hex(expected);
        if actual == expected {
            Ok(())
        } else {
            Err(ArtefactError::ChecksumMismatch {
                path: self.path.clone(),
                expected,
                actual,
            })
        }
    }
}

/// Computes the SHA-256 digest of the file at `path` as lowercase hex.
///
/// # Errors
///
/// Returns I/O errors from opening or reading the file.
pub fn compute_sha256(path: &Path) -> Result<String, ArtefactError> {
    let io_error = |source| ArtefactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
