use std::{path::Path, time::Duration};

use anyhow::Context;
use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA},
    Client, StatusCode,
};

use super::locator::Locator;

// Remote fetches never consult an HTTP-level cache; the disk cache is the
// only cache in play.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
}

pub async fn load_any(client: &Client, locator: &Locator) -> anyhow::Result<Vec<u8>> {
    use Locator::*;
    match locator {
        Local(path) => load_local(path).await,
        Remote(url) => load_url(client, url).await,
    }
}

async fn load_local(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .context(format!("Failed to load file {}", path.display()))
}

async fn load_url(client: &Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to get resource!")?;

    if response.status() != StatusCode::OK {
        anyhow::bail!("Status code is not OK: {}", response.status())
    }

    let bytes = response
        .bytes()
        .await
        .context("Failed to read body from response")?;

    Ok(bytes.to_vec())
}
