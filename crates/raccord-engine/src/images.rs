use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

/// Rendered frame handed to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Loads a frame from disk, flattened onto white and downscaled so the
    /// longest edge is at most `max_dim`. Undecodable files are sent as-is.
    pub fn from_path(path: &Path, max_dim: u32) -> Result<Self> {
        if let Some(prepared) = prepare_vision_image(path, max_dim) {
            return Ok(prepared);
        }
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Self::new(bytes, guess_image_mime(path)))
    }

    /// Parses `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let Some(rest) = url.trim().strip_prefix("data:") else {
            bail!("image data URL must start with 'data:'");
        };
        let Some((header, data)) = rest.split_once(',') else {
            bail!("image data URL has no payload");
        };
        let Some(mime) = header.strip_suffix(";base64") else {
            bail!("image data URL must be base64 encoded");
        };
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .context("image data URL base64 decode failed")?;
        let mime = if mime.trim().is_empty() {
            "image/png"
        } else {
            mime.trim()
        };
        Ok(Self::new(bytes, mime))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    /// SHA-256 of the bytes; used to reference frames in the journal.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Missing and zero-length frames both count as absent.
pub(crate) fn usable(image: Option<&ImagePayload>) -> Option<&ImagePayload> {
    image.filter(|payload| !payload.is_empty())
}

/// Normalizes a scene frame before the raccord comparison: the longest edge
/// is capped at `max_dim` (never below 128), transparency is flattened onto
/// white, and the result is JPEG-encoded. `None` when the file does not decode.
fn prepare_vision_image(path: &Path, max_dim: u32) -> Option<ImagePayload> {
    let limit = max_dim.max(128);
    let mut frame = image::open(path).ok()?;
    if frame.width().max(frame.height()) > limit {
        frame = frame.resize(limit, limit, FilterType::Triangle);
    }
    let mut canvas = RgbaImage::from_pixel(frame.width(), frame.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &frame.to_rgba8(), 0, 0);
    let flattened = DynamicImage::ImageRgba8(canvas).to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&flattened)
        .ok()?;
    Some(ImagePayload::new(bytes, "image/jpeg"))
}

fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}
