//! Asynchronous resource loading backed by a disk cache and a memory cache.
//!
//! Local files and `http(s)` URLs are fetched on a single background worker,
//! decoded by a [`BlobCodec`], written back to a flat disk cache when they
//! came from the network, and handed to caller callbacks when the owning
//! thread calls [`AssetCache::pump`].

pub mod cache;
pub mod codec;
pub mod config;
pub mod disk;
mod dispatch;
pub mod error;
pub mod memory;
mod util;
pub mod worker;

pub use cache::{AssetCache, Materializer};
pub use codec::{BlobCodec, PngCodec};
pub use config::CacheConfig;
pub use disk::DiskCache;
pub use error::{CacheError, ErrorKind};
pub use memory::{FontCache, Registry};
pub use worker::{locator::Locator, request::LoadEvent};
