use std::io::Cursor;

use anyhow::Context;
use image::{ImageFormat, RgbaImage};

/// Turns fetched bytes into a blob and back. The disk cache writes what
/// `encode` produces and reads it back through `decode`.
pub trait BlobCodec: Send + Sync + 'static {
    type Blob: Send + 'static;

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Self::Blob>;

    fn encode(&self, blob: &Self::Blob) -> anyhow::Result<Vec<u8>>;

    /// File extension used for disk cache entries, without the dot.
    fn extension(&self) -> &str;
}

/// Decodes any supported image into RGBA8 and persists it as PNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngCodec;

impl BlobCodec for PngCodec {
    type Blob = RgbaImage;

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<RgbaImage> {
        let img = image::load_from_memory(bytes).context("Failed to decode image from memory")?;
        Ok(img.to_rgba8())
    }

    fn encode(&self, blob: &RgbaImage) -> anyhow::Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        blob.write_to(&mut buf, ImageFormat::Png)
            .context("Failed to encode image as png")?;
        Ok(buf.into_inner())
    }

    fn extension(&self) -> &str {
        "png"
    }
}
