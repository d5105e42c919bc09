use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

/// Failures that abort cache construction. Everything that can go wrong
/// while serving a request is reduced to an [`ErrorKind`] instead.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory `{}`", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build the HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Why a request finished without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnavailable,
    DecodeFailed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            SourceUnavailable => f.write_str("source unavailable"),
            DecodeFailed => f.write_str("decode failed"),
        }
    }
}
