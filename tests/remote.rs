use std::{
    io::{Read, Write},
    net::TcpListener,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use assetcache::{AssetCache, BlobCodec, CacheConfig, ErrorKind, LoadEvent, PngCodec};
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

type Texture = Arc<RgbaImage>;

fn texture(img: &RgbaImage) -> Option<Texture> {
    Some(Arc::new(img.clone()))
}

type TestCache = AssetCache<PngCodec, fn(&RgbaImage) -> Option<Texture>>;

fn create_cache(asset_root: &Path) -> TestCache {
    let config = CacheConfig {
        poll_interval_ms: 1,
        remote_timeout_ms: 2000,
        ..CacheConfig::with_asset_root(asset_root)
    };
    AssetCache::new(config, PngCodec, texture as fn(&RgbaImage) -> Option<Texture>).unwrap()
}

fn png_bytes(size: u32) -> Vec<u8> {
    PngCodec
        .encode(&RgbaImage::from_pixel(size, size, Rgba([200, 100, 50, 255])))
        .unwrap()
}

struct Stub {
    url: String,
    hits: Arc<AtomicUsize>,
}

fn serve(status: &'static str, body: Vec<u8>) -> Stub {
    serve_with_delay(status, body, Duration::ZERO)
}

// Minimal HTTP server answering every request with `status` and `body`,
// after holding each response back for `delay`.
fn serve_with_delay(status: &'static str, body: Vec<u8>, delay: Duration) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            counter.fetch_add(1, Ordering::SeqCst);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            thread::sleep(delay);

            let header = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        }
    });

    Stub { url, hits }
}

fn pump_until(cache: &mut TestCache, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() && Instant::now() < deadline {
        cache.pump();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(done(), "request did not complete in time");
}

// Wait until the worker has taken every queued request off its queue.
fn wait_until_in_flight(cache: &TestCache) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while cache.pending() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(cache.pending(), 0, "worker never picked up the request");
}

fn record(
    seen: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> impl FnOnce(LoadEvent<RgbaImage>) + Send + 'static {
    let seen = Arc::clone(seen);
    move |_| seen.lock().unwrap().push(name)
}

#[test]
fn remote_fetch_is_written_to_disk_and_reused_by_a_fresh_cache() {
    let assets = TempDir::new().unwrap();
    let stub = serve("200 OK", png_bytes(8));

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    cache.request_resource(&format!("{}/img.png", stub.url), Some("a1"), move |texture| {
        *sink.lock().unwrap() = Some(texture.map(|t| t.dimensions()));
    });

    pump_until(&mut cache, || seen.lock().unwrap().is_some());
    assert_eq!(*seen.lock().unwrap(), Some(Some((8, 8))));
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);

    let cached_file = assets.path().join("cache").join("a1.png");
    assert!(cached_file.is_file());
    cache.stop();
    drop(cache);

    // a new process run: empty memory cache, same key, any locator
    let mut fresh = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    fresh.request_resource("https://elsewhere.invalid/other.png", Some("a1"), move |texture| {
        *sink.lock().unwrap() = Some(texture.map(|t| t.dimensions()));
    });

    assert!(!fresh.is_running());
    assert_eq!(fresh.pump(), 1);
    assert_eq!(*seen.lock().unwrap(), Some(Some((8, 8))));
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
}

#[test]
fn remote_fetch_without_key_is_not_persisted() {
    let assets = TempDir::new().unwrap();
    let stub = serve("200 OK", png_bytes(2));

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    cache.request_blob(&format!("{}/img.png", stub.url), None, move |event| {
        *sink.lock().unwrap() = Some(event.is_loaded());
    });

    pump_until(&mut cache, || seen.lock().unwrap().is_some());
    assert_eq!(*seen.lock().unwrap(), Some(true));

    let entries = std::fs::read_dir(assets.path().join("cache")).unwrap().count();
    assert_eq!(entries, 0);
}

#[test]
fn http_error_status_is_source_unavailable() {
    let assets = TempDir::new().unwrap();
    let stub = serve("404 Not Found", b"missing".to_vec());

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    cache.request_blob(&format!("{}/img.png", stub.url), Some("gone"), move |event| {
        *sink.lock().unwrap() = Some((event.payload.is_some(), event.error));
    });

    pump_until(&mut cache, || seen.lock().unwrap().is_some());
    assert_eq!(
        *seen.lock().unwrap(),
        Some((false, Some(ErrorKind::SourceUnavailable)))
    );
    assert!(!assets.path().join("cache").join("gone.png").exists());
}

#[test]
fn undecodable_body_is_decode_failed() {
    let assets = TempDir::new().unwrap();
    let stub = serve("200 OK", b"this is not an image".to_vec());

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    cache.request_resource(&format!("{}/img.png", stub.url), Some("junk"), move |texture| {
        *sink.lock().unwrap() = Some(texture.is_some());
    });

    pump_until(&mut cache, || seen.lock().unwrap().is_some());
    assert_eq!(*seen.lock().unwrap(), Some(false));
    assert!(cache.cached("junk").is_none());
    assert!(!assets.path().join("cache").join("junk.png").exists());
}

#[test]
fn duplicate_requests_both_fetch() {
    let assets = TempDir::new().unwrap();
    let stub = serve("200 OK", png_bytes(3));

    let mut cache = create_cache(assets.path());
    let url = format!("{}/img.png", stub.url);
    let done = Arc::new(AtomicUsize::new(0));

    // second request is queued before the first completes, so neither
    // cache short-circuits it
    for _ in 0..2 {
        let done = Arc::clone(&done);
        cache.request_resource(&url, Some("dup"), move |texture| {
            assert!(texture.is_some());
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    pump_until(&mut cache, || done.load(Ordering::SeqCst) == 2);
    assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    assert!(cache.cached("dup").is_some());
}

#[test]
fn restarting_after_stop_does_not_wait_for_the_in_flight_fetch() {
    let assets = TempDir::new().unwrap();
    let stub = serve_with_delay("200 OK", png_bytes(2), Duration::from_millis(1000));

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(vec![]));
    cache.request_blob(&format!("{}/slow.png", stub.url), None, record(&seen, "slow"));
    wait_until_in_flight(&cache);

    cache.stop();
    let started = Instant::now();
    cache.request_blob("/nowhere.png", None, record(&seen, "local"));
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(250),
        "request blocked for {:?}",
        elapsed
    );
    assert!(cache.is_running());

    // both are delivered: the new thread serves the local request, the old
    // one still finishes its fetch
    pump_until(&mut cache, || seen.lock().unwrap().len() == 2);
    let mut names = seen.lock().unwrap().clone();
    names.sort();
    assert_eq!(names, ["local", "slow"]);
}

#[test]
fn pump_before_completion_delivers_nothing_and_stop_strands_queued_work() {
    let assets = TempDir::new().unwrap();
    let stub = serve_with_delay("200 OK", png_bytes(2), Duration::from_millis(500));

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(vec![]));
    cache.request_blob(&format!("{}/slow.png", stub.url), None, record(&seen, "slow"));
    wait_until_in_flight(&cache);
    cache.request_blob("/nowhere.png", None, record(&seen, "queued"));

    // nothing has completed yet
    assert_eq!(cache.pump(), 0);
    assert_eq!(cache.completed(), 0);
    assert!(seen.lock().unwrap().is_empty());

    cache.stop();

    // the in-flight fetch is not interrupted
    pump_until(&mut cache, || !seen.lock().unwrap().is_empty());
    assert_eq!(*seen.lock().unwrap(), ["slow"]);

    // the stopped thread exits without touching the queue again
    thread::sleep(Duration::from_millis(100));
    assert_eq!(cache.pump(), 0);
    assert_eq!(cache.pending(), 1);
    assert!(!cache.is_running());
    assert_eq!(*seen.lock().unwrap(), ["slow"]);
}

#[test]
fn non_png_remote_source_is_persisted_as_png() {
    let assets = TempDir::new().unwrap();
    let mut jpeg = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(6, 4, Rgb([40, 80, 160]))
        .write_to(&mut jpeg, ImageFormat::Jpeg)
        .unwrap();
    let stub = serve("200 OK", jpeg.into_inner());

    let mut cache = create_cache(assets.path());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    cache.request_blob(&format!("{}/photo.jpg", stub.url), Some("photo"), move |event| {
        *sink.lock().unwrap() = Some(event.payload.map(|b| b.dimensions()));
    });

    pump_until(&mut cache, || seen.lock().unwrap().is_some());
    assert_eq!(*seen.lock().unwrap(), Some(Some((6, 4))));

    let stored = std::fs::read(assets.path().join("cache").join("photo.png")).unwrap();
    assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Png);
}
