use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

use crate::util;

const DEFAULT_ASSET_ROOT: &str = "./assets";
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 1000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Settings for an [`AssetCache`](crate::AssetCache).
///
/// Every field is optional in the TOML form:
///
/// ```toml
/// asset_root = "./assets"
/// cache_dir = "cache"
/// remote_timeout_ms = 1000
/// poll_interval_ms = 20
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Root that asset-relative paths and the cache directory resolve against.
    pub asset_root: PathBuf,

    /// Name of the disk cache directory under `asset_root`.
    pub cache_dir: String,

    /// Timeout applied to remote fetches. Local reads have none.
    pub remote_timeout_ms: u64,

    /// How long the fetch worker sleeps between queue checks.
    pub poll_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    pub fn with_asset_root(asset_root: impl Into<PathBuf>) -> Self {
        CacheConfig {
            asset_root: asset_root.into(),
            ..CacheConfig::default()
        }
    }

    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let table = util::toml::read(path)?;

        toml::Value::Table(table)
            .try_into()
            .context(format!("Invalid cache configuration in {}.", path.display()))
    }

    pub fn cache_directory(&self) -> PathBuf {
        self.asset_root.join(&self.cache_dir)
    }

    pub fn asset_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.asset_root.join(relative)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
