use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use assetcache::{AssetCache, CacheConfig, PngCodec};
use clap::Parser;
use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(16);

// "key=locator"; a URL's own `=` never matches since the key has no `:` or `/`
const KEYED_REQUEST_SPEC: &str = r"^([A-Za-z0-9_.-]+)=(.+)$";

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct CLIArguments {
    /// Asset root; the disk cache lives in its `cache` directory.
    #[arg(short, long)]
    assets: Option<String>,

    /// Optional TOML file with cache settings.
    #[arg(short, long)]
    config: Option<String>,

    /// Give up on outstanding requests after this many seconds.
    #[arg(short, long, default_value_t = 10)]
    wait: u64,

    /// Resources to load, as `locator` or `key=locator`.
    #[arg(required = true)]
    requests: Vec<String>,
}

// What the command line "materializes" images into.
#[derive(Debug)]
struct Texture {
    width: u32,
    height: u32,
}

fn materialize(img: &RgbaImage) -> Option<Arc<Texture>> {
    let (width, height) = img.dimensions();
    Some(Arc::new(Texture { width, height }))
}

fn parse_request(raw: &str) -> (Option<&str>, &str) {
    static KEYED_REQUEST: Lazy<Regex> = Lazy::new(|| Regex::new(KEYED_REQUEST_SPEC).unwrap());

    match KEYED_REQUEST.captures(raw) {
        Some(captures) => match (captures.get(1), captures.get(2)) {
            (Some(key), Some(locator)) => (Some(key.as_str()), locator.as_str()),
            _ => (None, raw),
        },
        None => (None, raw),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let CLIArguments {
        assets,
        config,
        wait,
        requests,
    } = CLIArguments::parse();

    let mut settings = match config {
        Some(path) => CacheConfig::load(&PathBuf::from(path))?,
        None => CacheConfig::default(),
    };
    if let Some(assets) = assets {
        settings.asset_root = PathBuf::from(assets);
    }

    info!(
        "Loading {} resource(s), cache at `{}`.",
        requests.len(),
        settings.cache_directory().display()
    );

    let mut cache = AssetCache::new(settings, PngCodec, materialize)
        .context("Failed to set up the asset cache")?;

    let finished = Arc::new(AtomicUsize::new(0));
    let loaded = Arc::new(AtomicUsize::new(0));

    for raw in &requests {
        let (cache_key, locator) = parse_request(raw);
        let description = raw.clone();
        let finished = Arc::clone(&finished);
        let loaded = Arc::clone(&loaded);

        cache.request_resource(locator, cache_key, move |texture| {
            match texture {
                Some(texture) => {
                    info!(
                        "Loaded `{}` ({}x{}).",
                        description, texture.width, texture.height
                    );
                    loaded.fetch_add(1, Ordering::SeqCst);
                }
                None => warn!("Could not load `{}`.", description),
            }
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    let deadline = Instant::now() + Duration::from_secs(wait);
    while finished.load(Ordering::SeqCst) < requests.len() && Instant::now() < deadline {
        cache.pump();
        std::thread::sleep(TICK);
    }

    cache.stop();

    let finished = finished.load(Ordering::SeqCst);
    if finished < requests.len() {
        warn!(
            "Gave up on {} request(s) after {}s.",
            requests.len() - finished,
            wait
        );
    }

    info!(
        "{} of {} resource(s) loaded.",
        loaded.load(Ordering::SeqCst),
        requests.len()
    );

    Ok(())
}
