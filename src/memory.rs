//! In-process caches of materialized resources.
//!
//! Neither cache is synchronized: they belong to the owner thread and are
//! only touched from the facade, `pump()` included.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::warn;

/// Key to resource map. Last writer wins, nothing is ever evicted.
pub struct Registry<R> {
    entries: HashMap<String, R>,
}

impl<R: Clone> Registry<R> {
    pub fn new() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<R> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: impl Into<String>, resource: R) {
        self.entries.insert(key.into(), resource);
    }

    /// Return the resource under `key`, or run `loader` and remember what it
    /// produces. A loader returning `None` leaves the registry untouched.
    pub fn get_or_create(&mut self, key: &str, loader: impl FnOnce() -> Option<R>) -> Option<R> {
        if let Some(resource) = self.get(key) {
            return Some(resource);
        }

        let resource = loader()?;
        self.entries.insert(key.to_string(), resource.clone());
        Some(resource)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Clone> Default for Registry<R> {
    fn default() -> Self {
        Registry::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FontKey {
    name: String,
    size: u32,
}

/// Fonts by `(name, size)`. Few entries are expected, so lookups are a
/// linear scan.
pub struct FontCache<F> {
    asset_root: PathBuf,
    fonts: Vec<(FontKey, F)>,
}

impl<F: Clone> FontCache<F> {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        FontCache {
            asset_root: asset_root.into(),
            fonts: vec![],
        }
    }

    /// Return the cached font, or resolve `name` under the asset root and hand
    /// the path to `loader`. Loader failures are logged and yield `None`.
    pub fn get_or_create(
        &mut self,
        name: &str,
        size: u32,
        loader: impl FnOnce(&Path, u32) -> anyhow::Result<F>,
    ) -> Option<F> {
        for (key, font) in &self.fonts {
            if key.name == name && key.size == size {
                return Some(font.clone());
            }
        }

        let path = self.asset_root.join(name);
        match loader(&path, size) {
            Ok(font) => {
                let key = FontKey {
                    name: name.to_string(),
                    size,
                };
                self.fonts.push((key, font.clone()));
                Some(font)
            }
            Err(err) => {
                warn!("Failed to load font `{}` at size {}: {:#}", name, size, err);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
