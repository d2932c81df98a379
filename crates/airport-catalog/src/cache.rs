//! Content-addressed on-disk cache
//!
//! One file per sha256 under `<base>/<first two hex digits>/<hash>`. Entries
//! are stored exactly as received (still compressed) and are verified
//! against their hash on every read.

use std::path::{Path, PathBuf};

use airport_core::{AirportError, LocationDescriptor, Result};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compare `bytes` against an expected hex digest.
pub fn verify_hash(expected: &str, bytes: &[u8], location: &LocationDescriptor) -> Result<()> {
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(AirportError::HashMismatch {
            location: location.clone(),
            expected: expected.to_string(),
            actual,
        })
    }
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() >= 2 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone)]
pub struct ContentCache {
    base: PathBuf,
}

impl ContentCache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path_for(&self, sha256: &str, location: &LocationDescriptor) -> Result<PathBuf> {
        if !is_valid_hash(sha256) {
            return Err(AirportError::protocol(
                location,
                format!("invalid content hash '{}'", sha256),
            ));
        }
        let hash = sha256.to_ascii_lowercase();
        Ok(self.base.join(&hash[..2]).join(&hash))
    }

    /// Cached bytes for `sha256`, if present and intact.
    ///
    /// An entry whose content no longer matches its hash is removed and
    /// reported as a miss so the caller refetches it.
    pub async fn get(&self, sha256: &str, location: &LocationDescriptor) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(sha256, location)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AirportError::cache(location, path, e)),
        };
        if verify_hash(sha256, &bytes, location).is_err() {
            warn!(path = %path.display(), "Discarding corrupt cache entry");
            fs::remove_file(&path)
                .await
                .map_err(|e| AirportError::cache(location, &path, e))?;
            return Ok(None);
        }
        debug!(path = %path.display(), bytes = bytes.len(), "cache hit");
        Ok(Some(bytes))
    }

    /// Store `bytes` under `sha256`. The write is atomic: a temporary file is
    /// renamed into place.
    pub async fn put(&self, sha256: &str, bytes: &[u8], location: &LocationDescriptor) -> Result<PathBuf> {
        let path = self.path_for(sha256, location)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| AirportError::cache(location, dir, e))?;
        }
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| AirportError::cache(location, &tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| AirportError::cache(location, &path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "cache store");
        Ok(path)
    }
}
