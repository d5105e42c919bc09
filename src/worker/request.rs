use crate::error::ErrorKind;

pub(crate) type BlobCallback<B> = Box<dyn FnOnce(LoadEvent<B>) + Send + 'static>;
pub(crate) type ResourceCallback<R> = Box<dyn FnOnce(Option<R>) + Send + 'static>;

// What happens to a finished request once `pump()` reaches it.
pub(crate) enum Delivery<B, R> {
    // hand the blob to the caller as-is
    Blob(BlobCallback<B>),
    // materialize, remember under the cache key, then hand over the resource
    Resource(ResourceCallback<R>),
}

/// One fetch attempt, owned by exactly one queue at a time.
///
/// The callback is consumed when the request is delivered, so a request can
/// never be handled twice.
pub(crate) struct Request<B, R> {
    pub locator: String,
    pub cache_key: Option<String>,
    pub delivery: Delivery<B, R>,
}

/// A request that has finished loading, successfully or not.
pub(crate) struct Completed<B, R> {
    pub request: Request<B, R>,
    pub payload: Option<B>,
    pub error: Option<ErrorKind>,
}

impl<B, R> Completed<B, R> {
    pub fn loaded(request: Request<B, R>, blob: B) -> Self {
        Completed {
            request,
            payload: Some(blob),
            error: None,
        }
    }

    pub fn failed(request: Request<B, R>, error: ErrorKind) -> Self {
        Completed {
            request,
            payload: None,
            error: Some(error),
        }
    }
}

/// What a blob callback receives.
///
/// `payload` is `None` whenever the load failed; `error` says why, for
/// callers that care.
#[derive(Debug)]
pub struct LoadEvent<B> {
    pub locator: String,
    pub cache_key: Option<String>,
    pub payload: Option<B>,
    pub error: Option<ErrorKind>,
}

impl<B> LoadEvent<B> {
    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }
}
