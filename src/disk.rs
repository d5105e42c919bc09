//! Flat directory of encoded blobs, one file per cache key.
//!
//! ```text
//! {cache_dir}/{cache_key}.{ext}
//! ```
//!
//! There is no index and no metadata: a correctly named file that decodes
//! is a hit, anything else is a miss.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::{codec::BlobCodec, error::CacheError, util};

pub struct DiskCache<C> {
    directory: PathBuf,
    codec: C,
}

impl<C: BlobCodec> DiskCache<C> {
    /// Open the cache rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DirectoryCreate`] if the directory cannot be created.
    pub fn open(directory: impl Into<PathBuf>, codec: C) -> Result<Self, CacheError> {
        let directory = directory.into();
        util::dir::ensure(&directory)?;
        Ok(DiskCache { directory, codec })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Where `cache_key` lives on disk, or `None` if the key cannot name a
    /// file inside the cache directory.
    pub fn path_for(&self, cache_key: &str) -> Option<PathBuf> {
        if !is_valid_key(cache_key) {
            return None;
        }

        Some(
            self.directory
                .join(format!("{}.{}", cache_key, self.codec.extension())),
        )
    }

    /// Read and decode the entry for `cache_key`. Missing files, unreadable
    /// files and decode failures are all reported as a miss.
    pub fn lookup(&self, cache_key: &str) -> Option<C::Blob> {
        let path = self.path_for(cache_key)?;

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!(cache_key, "Disk cache miss");
                return None;
            }
        };

        match self.codec.decode(&bytes) {
            Ok(blob) => {
                debug!(cache_key, "Disk cache hit");
                Some(blob)
            }
            Err(err) => {
                warn!(
                    cache_key,
                    "Ignoring unreadable cache file `{}`: {:#}",
                    path.display(),
                    err
                );
                None
            }
        }
    }

    /// Encode `blob` and write it under `cache_key`, replacing any previous entry.
    pub async fn store(&self, cache_key: &str, blob: &C::Blob) -> anyhow::Result<()> {
        let Some(path) = self.path_for(cache_key) else {
            anyhow::bail!("Cache key `{}` is not a valid file name.", cache_key);
        };

        let bytes = self.codec.encode(blob)?;

        tokio::fs::write(&path, bytes)
            .await
            .context(format!("Failed to write cache file {}", path.display()))?;

        debug!(cache_key, "Stored `{}`", path.display());
        Ok(())
    }
}

// Keys are opaque, but they must not escape the cache directory.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.chars().any(|c| c == '/' || c == '\\' || c == '\0')
}
