use std::{
    any::{Any, TypeId},
    collections::HashMap,
    path::Path,
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    codec::BlobCodec,
    config::CacheConfig,
    disk::DiskCache,
    dispatch::DispatchQueue,
    error::CacheError,
    memory::{FontCache, Registry},
    worker::{
        loaders,
        request::{Completed, Delivery, LoadEvent, Request},
        FetchWorker,
    },
};

/// Turns a decoded blob into the object callers actually hold on to, e.g.
/// a GPU texture handle. Runs on the owner thread only.
pub trait Materializer<B> {
    type Resource: Clone;

    fn materialize(&self, blob: &B) -> Option<Self::Resource>;
}

impl<B, R, F> Materializer<B> for F
where
    R: Clone,
    F: Fn(&B) -> Option<R>,
{
    type Resource = R;

    fn materialize(&self, blob: &B) -> Option<R> {
        self(blob)
    }
}

/// Asynchronous resource loading with a disk cache and a memory cache.
///
/// The cache is owned by one thread, which issues requests and calls
/// [`pump`](AssetCache::pump) once per tick. Loads happen on a single
/// background worker, started on the first request that needs it. Every
/// callback runs inside `pump()` (or synchronously, on a memory cache hit)
/// on the owner thread.
///
/// Failures are never reported as errors: a callback simply receives no
/// payload. [`LoadEvent::error`] tells blob-level callers why.
pub struct AssetCache<C, M>
where
    C: BlobCodec,
    M: Materializer<C::Blob>,
{
    config: CacheConfig,
    materializer: M,
    resources: Registry<M::Resource>,
    // one FontCache<F> per font type F
    fonts: HashMap<TypeId, Box<dyn Any>>,
    disk: Arc<DiskCache<C>>,
    dispatch: DispatchQueue<C::Blob, M::Resource>,
    worker: FetchWorker<C, M::Resource>,
}

impl<C, M> AssetCache<C, M>
where
    C: BlobCodec,
    M: Materializer<C::Blob>,
    M::Resource: 'static,
{
    /// Open the disk cache under the configured asset root and set up the
    /// (not yet running) fetch worker.
    ///
    /// # Errors
    ///
    /// Fails if the cache directory cannot be created or the HTTP client
    /// cannot be built.
    pub fn new(config: CacheConfig, codec: C, materializer: M) -> Result<Self, CacheError> {
        let disk = Arc::new(DiskCache::open(config.cache_directory(), codec)?);
        let client = loaders::http_client(config.remote_timeout())?;
        let dispatch = DispatchQueue::new();
        let worker = FetchWorker::new(
            dispatch.clone(),
            Arc::clone(&disk),
            client,
            config.poll_interval(),
        );

        debug!(
            "Asset cache ready, cache directory `{}`.",
            disk.directory().display()
        );

        Ok(AssetCache {
            config,
            materializer,
            resources: Registry::new(),
            fonts: HashMap::new(),
            disk,
            dispatch,
            worker,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn disk(&self) -> &DiskCache<C> {
        &self.disk
    }

    /// A resource already in the memory cache, if any.
    pub fn cached(&self, key: &str) -> Option<M::Resource> {
        self.resources.get(key)
    }

    /// Request a materialized resource.
    ///
    /// With a cache key already in the memory cache, `callback` runs right
    /// away with the cached resource. Otherwise the blob comes from the disk
    /// cache or the fetch worker, and on the next `pump()` it is
    /// materialized, remembered under `cache_key`, and passed to `callback`.
    /// `callback` receives `None` if anything fails along the way.
    pub fn request_resource<F>(&mut self, locator: &str, cache_key: Option<&str>, callback: F)
    where
        F: FnOnce(Option<M::Resource>) + Send + 'static,
    {
        let cache_key = normalize_key(cache_key);

        if let Some(key) = cache_key.as_deref() {
            if let Some(resource) = self.resources.get(key) {
                debug!(cache_key = key, "Memory cache hit");
                callback(Some(resource));
                return;
            }
        }

        self.submit(locator, cache_key, Delivery::Resource(Box::new(callback)));
    }

    /// Request the decoded blob itself. The memory cache is not consulted and
    /// nothing is materialized; `callback` runs on a later `pump()`.
    pub fn request_blob<F>(&mut self, locator: &str, cache_key: Option<&str>, callback: F)
    where
        F: FnOnce(LoadEvent<C::Blob>) + Send + 'static,
    {
        let cache_key = normalize_key(cache_key);
        self.submit(locator, cache_key, Delivery::Blob(Box::new(callback)));
    }

    fn submit(
        &mut self,
        locator: &str,
        cache_key: Option<String>,
        delivery: Delivery<C::Blob, M::Resource>,
    ) {
        let request = Request {
            locator: locator.to_string(),
            cache_key,
            delivery,
        };

        // a disk hit skips the worker but is still delivered by pump()
        if let Some(key) = request.cache_key.as_deref() {
            if let Some(blob) = self.disk.lookup(key) {
                self.dispatch.push(Completed::loaded(request, blob));
                return;
            }
        }

        self.worker.start();
        self.worker.submit(request);
    }

    /// Synchronously load, decode and materialize a file, keyed by its path.
    /// Later calls with the same path return the same resource.
    pub fn resource_by_full_path(&mut self, path: impl AsRef<Path>) -> Option<M::Resource> {
        let path = path.as_ref();
        let key = path.to_string_lossy();

        let codec = self.disk.codec();
        let materializer = &self.materializer;

        self.resources.get_or_create(&key, || {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Failed to read `{}`: {}", path.display(), err);
                    return None;
                }
            };

            match codec.decode(&bytes) {
                Ok(blob) => materializer.materialize(&blob),
                Err(err) => {
                    warn!("Failed to decode `{}`: {:#}", path.display(), err);
                    None
                }
            }
        })
    }

    /// [`resource_by_full_path`](Self::resource_by_full_path) for a path
    /// relative to the asset root.
    pub fn resource_by_asset_path(&mut self, relative: impl AsRef<Path>) -> Option<M::Resource> {
        let path = self.config.asset_path(relative);
        self.resource_by_full_path(path)
    }

    /// Return the font for `(name, size)`, loading it on first use. `name`
    /// resolves under the asset root and the resolved path goes to `loader`.
    /// Fonts are never evicted; a failed load yields `None` and is retried on
    /// the next call.
    pub fn font<F>(
        &mut self,
        name: &str,
        size: u32,
        loader: impl FnOnce(&Path, u32) -> anyhow::Result<F>,
    ) -> Option<F>
    where
        F: Clone + 'static,
    {
        let asset_root = &self.config.asset_root;
        let fonts = self
            .fonts
            .entry(TypeId::of::<F>())
            .or_insert_with(|| Box::new(FontCache::<F>::new(asset_root.clone())))
            .downcast_mut::<FontCache<F>>()?;

        fonts.get_or_create(name, size, loader)
    }

    /// Deliver every completed request to its callback, on the calling
    /// thread, in completion order. Returns how many were delivered.
    ///
    /// Safe to call at any time, including before the worker ever started.
    pub fn pump(&mut self) -> usize {
        let completed = self.dispatch.drain();
        let delivered = completed.len();

        for event in completed {
            self.deliver(event);
        }

        delivered
    }

    fn deliver(&mut self, completed: Completed<C::Blob, M::Resource>) {
        let Completed {
            request,
            payload,
            error,
        } = completed;

        let Request {
            locator,
            cache_key,
            delivery,
        } = request;

        match delivery {
            Delivery::Blob(callback) => callback(LoadEvent {
                locator,
                cache_key,
                payload,
                error,
            }),
            Delivery::Resource(callback) => {
                let resource = payload.and_then(|blob| self.materializer.materialize(&blob));

                if let (Some(resource), Some(key)) = (&resource, cache_key) {
                    self.resources.insert(key, resource.clone());
                }

                callback(resource)
            }
        }
    }

    /// Start the fetch worker. No-op while it is running.
    pub fn start(&mut self) {
        self.worker.start();
    }

    /// Signal the fetch worker to exit after its current iteration. Requests
    /// still queued at that point are not delivered unless the worker is
    /// started again.
    pub fn stop(&self) {
        self.worker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Requests waiting for the fetch worker.
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }

    /// Completed requests waiting for `pump()`.
    pub fn completed(&self) -> usize {
        self.dispatch.len()
    }
}

// An empty key means "no key".
fn normalize_key(cache_key: Option<&str>) -> Option<String> {
    cache_key.filter(|key| !key.is_empty()).map(str::to_string)
}
