//! Cover image pipeline for binary uploads.
//!
//! Downloads a catalog poster, scales and crops it to the site's cover
//! dimensions and re-encodes it as JPEG, tagged with a content hash.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::CoverConfig;
use crate::store::CoverBlob;

/// Downloads and prepares cover images.
pub struct CoverFetcher {
    client: reqwest::Client,
    width: u32,
    height: u32,
    quality: u8,
}

impl CoverFetcher {
    pub fn new(config: &CoverConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build cover download client")?;

        Ok(Self {
            client,
            width: config.width,
            height: config.height,
            quality: config.jpeg_quality.clamp(1, 100),
        })
    }

    /// Download the image at `url` and prepare it for upload.
    pub async fn fetch(&self, url: &str) -> Result<CoverBlob> {
        let data = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download image from {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP error downloading image from {}", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read image bytes from {}", url))?;

        let blob = self.prepare(&data)?;
        debug!(url, hash = %blob.hash, bytes = blob.data.len(), "Prepared cover image");
        Ok(blob)
    }

    /// Resize to the cover dimensions and encode as JPEG.
    pub fn prepare(&self, data: &[u8]) -> Result<CoverBlob> {
        let img = image::load_from_memory(data).context("Failed to decode image data")?;
        let resized = img.resize_to_fill(self.width, self.height, FilterType::Lanczos3).to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&resized)
            .context("Failed to encode cover as JPEG")?;

        Ok(CoverBlob {
            hash: compute_hash(&buf),
            width: resized.width(),
            height: resized.height(),
            content_type: "image/jpeg",
            data: Bytes::from(buf),
        })
    }
}

/// First 16 hex characters of the SHA-256 digest.
fn compute_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..8])
}
