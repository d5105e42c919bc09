use std::path::Path;

use tracing::debug;

use crate::error::CacheError;

// Create the directory (and its parents) unless it already exists
pub fn ensure(path: &Path) -> Result<(), CacheError> {
    if path.is_dir() {
        return Ok(());
    }

    debug!("Creating directory `{}`.", path.display());

    std::fs::create_dir_all(path).map_err(|source| CacheError::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}
