//! SHA-256 verification of downloaded artifacts.

use anyhow::{Context, Result};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

use crate::runtime::Runtime;
use crate::validation::{ValidationError, validate_sha256};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed expected digest: {0}")]
    Malformed(#[from] ValidationError),
    #[error("SHA256 mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Hex SHA-256 of the whole file, lowercase.
#[tracing::instrument(skip(runtime))]
pub fn sha256_file<R: Runtime>(runtime: &R, path: &Path) -> Result<String> {
    let mut reader = runtime
        .open(path)
        .with_context(|| format!("open {} for verification", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher).context("compute SHA256")?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare the file's digest against `expected` (hex, any case).
///
/// On mismatch the file is deleted before the error is returned.
#[tracing::instrument(skip(runtime))]
pub fn verify_sha256<R: Runtime>(runtime: &R, path: &Path, expected: &str) -> Result<()> {
    validate_sha256(expected).map_err(VerifyError::from)?;

    let actual = sha256_file(runtime, path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        if let Err(e) = runtime.remove_file(path) {
            warn!("Failed to remove {}: {:#}", path.display(), e);
        }
        return Err(VerifyError::Mismatch {
            expected: expected.to_ascii_lowercase(),
            actual,
        }
        .into());
    }

    debug!("SHA256 of {} matches {}", path.display(), actual);
    Ok(())
}
