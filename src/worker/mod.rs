//! The single background fetch thread.
//!
//! Requests are serviced strictly FIFO. The worker polls its queue on a
//! fixed interval, performs the fetch and decode, writes remote results back
//! to the disk cache, and hands every finished request to the dispatch
//! queue. It never touches the memory cache.
//!
//! A stopped thread still finishes its in-flight request, so right after a
//! restart that one request may be delivered after work the new thread has
//! already completed.

pub(crate) mod loaders;
pub mod locator;
pub(crate) mod request;

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    codec::BlobCodec,
    disk::DiskCache,
    dispatch::{lock, DispatchQueue},
    error::ErrorKind,
};

use locator::Locator;
use request::{Completed, Request};

const THREAD_NAME: &str = "assetcache-fetch";

type WorkQueue<B, R> = Arc<Mutex<VecDeque<Request<B, R>>>>;

// Everything the worker thread needs, cloned out of the handle on start.
struct WorkerContext<C: BlobCodec, R> {
    queue: WorkQueue<C::Blob, R>,
    dispatch: DispatchQueue<C::Blob, R>,
    disk: Arc<DiskCache<C>>,
    client: reqwest::Client,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

pub(crate) struct FetchWorker<C: BlobCodec, R> {
    queue: WorkQueue<C::Blob, R>,
    dispatch: DispatchQueue<C::Blob, R>,
    disk: Arc<DiskCache<C>>,
    client: reqwest::Client,
    poll_interval: Duration,
    // flag of the current thread; each start() gets a fresh one
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    spawned: u64,
}

impl<C: BlobCodec, R: 'static> FetchWorker<C, R> {
    pub fn new(
        dispatch: DispatchQueue<C::Blob, R>,
        disk: Arc<DiskCache<C>>,
        client: reqwest::Client,
        poll_interval: Duration,
    ) -> Self {
        FetchWorker {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            dispatch,
            disk,
            client,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            spawned: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the worker thread unless one is already running. Never waits
    /// on a previous, stopped thread.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        // A stopped thread may still be finishing its last fetch. It owns its
        // own flag, already cleared, so it exits without popping again.
        if let Some(previous) = self.handle.take() {
            if previous.is_finished() && previous.join().is_err() {
                error!("Previous fetch worker panicked.");
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);

        let context = WorkerContext {
            queue: Arc::clone(&self.queue),
            dispatch: self.dispatch.clone(),
            disk: Arc::clone(&self.disk),
            client: self.client.clone(),
            poll_interval: self.poll_interval,
            running,
        };

        let spawned = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(context));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.spawned += 1;
                info!(generation = self.spawned, "Fetch worker started.");
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                error!("Failed to spawn fetch worker: {}", err);
            }
        }
    }

    /// Ask the worker to exit after its current iteration. Does not wait.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Fetch worker stopping.");
        }
    }

    pub fn submit(&self, request: Request<C::Blob, R>) {
        debug!(locator = %request.locator, "Queueing fetch");
        lock(&self.queue).push_back(request);
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    #[cfg(test)]
    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

impl<C: BlobCodec, R> Drop for FetchWorker<C, R> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn run<C: BlobCodec, R>(context: WorkerContext<C, R>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    match runtime {
        Ok(runtime) => runtime.block_on(work(context)),
        Err(err) => {
            context.running.store(false, Ordering::Release);
            error!("Failed to start fetch worker runtime: {}", err);
        }
    }
}

async fn work<C: BlobCodec, R>(context: WorkerContext<C, R>) {
    while context.running.load(Ordering::Acquire) {
        // the lock is released before any I/O happens
        let next = lock(&context.queue).pop_front();

        if let Some(request) = next {
            let completed = process_single(&context, request).await;
            context.dispatch.push(completed);
        }

        tokio::time::sleep(context.poll_interval).await;
    }

    let abandoned = lock(&context.queue).len();
    if abandoned > 0 {
        warn!(
            "Fetch worker stopped with {} request(s) still queued; they are only delivered if a worker is started again.",
            abandoned
        );
    } else {
        info!("Fetch worker stopped.");
    }
}

async fn process_single<C: BlobCodec, R>(
    context: &WorkerContext<C, R>,
    request: Request<C::Blob, R>,
) -> Completed<C::Blob, R> {
    let locator = Locator::from(request.locator.as_str());

    let bytes = match loaders::load_any(&context.client, &locator).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to retrieve {}: {:#}", locator, err);
            return Completed::failed(request, ErrorKind::SourceUnavailable);
        }
    };

    let blob = match context.disk.codec().decode(&bytes) {
        Ok(blob) => blob,
        Err(err) => {
            warn!("Failed to decode {}: {:#}", locator, err);
            return Completed::failed(request, ErrorKind::DecodeFailed);
        }
    };

    // local sources are already on disk; only remote fetches are written back
    if locator.is_remote() {
        if let Some(cache_key) = request.cache_key.as_deref() {
            if let Err(err) = context.disk.store(cache_key, &blob).await {
                warn!(cache_key, "Failed to persist {}: {:#}", locator, err);
            }
        }
    }

    debug!("Loaded {}", locator);
    Completed::loaded(request, blob)
}
