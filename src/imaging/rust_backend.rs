//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader::into_dimensions` (header only) |
//! | Decode | `image::ImageReader::decode` with default allocation limits |
//! | Pre-scale | `DynamicImage::resize` with `Triangle` (cheap, aspect-preserving) |
//! | Exact resample | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → WebP | `webp::Encoder` (lossy libwebp) |
//!
//! Every operation takes and returns in-memory buffers.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{calculate_budget_bound, calculate_prescale_bound};
use super::params::{EncodeParams, OutputFormat, PreScale, Quality};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Largest output the backend agrees to allocate (≈ 8000 × 8000).
pub const MAX_OUTPUT_PIXELS: u64 = 64_000_000;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("cannot sniff image format: {e}")))
}

/// Sort decoder errors into the backend taxonomy.
fn decode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::Limits(limit) => BackendError::Resource(limit.to_string()),
        ImageError::IoError(io) if io.kind() == std::io::ErrorKind::OutOfMemory => {
            BackendError::Resource(io.to_string())
        }
        other => BackendError::Decode(other.to_string()),
    }
}

fn encode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::Limits(limit) => BackendError::Resource(limit.to_string()),
        other => BackendError::Encode(other.to_string()),
    }
}

/// Load and fully decode an image buffer.
fn load_image(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    reader(bytes)?.decode().map_err(decode_error)
}

fn dimensions_of(img: &DynamicImage) -> Dimensions {
    let (width, height) = img.dimensions();
    Dimensions { width, height }
}

/// Shrink `img` so its longer side equals `bound`, keeping the aspect ratio.
fn shrink_to(img: DynamicImage, bound: u32) -> DynamicImage {
    img.resize(bound, bound, FilterType::Triangle)
}

/// The approximate first pass.
///
/// One bounded downscale for `max_side`, then, if a budget is set, one trial
/// encode at the requested quality and at most one further shrink estimated
/// from how far over budget it came out. No loop: the result may still be
/// over budget.
fn prescale(
    img: DynamicImage,
    plan: &PreScale,
    target: Dimensions,
    format: OutputFormat,
    quality: Quality,
) -> Result<DynamicImage, BackendError> {
    let mut img = img;

    if let Some(max_side) = plan.max_side {
        if let Some(bound) = calculate_prescale_bound(dimensions_of(&img), target, max_side) {
            debug!(bound, "pre-scale: bounding longer side");
            img = shrink_to(img, bound);
        }
    }

    if let Some(budget) = plan.budget_bytes {
        let trial = encode_image(&img, format, quality)?;
        if let Some(bound) =
            calculate_budget_bound(dimensions_of(&img), target, trial.len() as u64, budget)
        {
            debug!(
                bound,
                trial_bytes = trial.len(),
                budget,
                "pre-scale: over budget, shrinking once"
            );
            img = shrink_to(img, bound);
        }
    }

    Ok(img)
}

/// Encode to the requested format.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Webp => encode_webp(img, quality),
    }
}

/// JPEG has no alpha channel; flatten to RGB8 first.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.percent());
    rgb.write_with_encoder(encoder).map_err(encode_error)?;
    Ok(buf)
}

/// Lossy WebP through libwebp; quality on libwebp's 0–100 scale.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let (width, height) = img.dimensions();
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality.value() * 100.0)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, quality.value() * 100.0)
    };
    encoded
        .map(|memory| memory.to_vec())
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e:?}")))
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(bytes)?.into_dimensions().map_err(decode_error)?;
        Ok(Dimensions { width, height })
    }

    fn encode(&self, bytes: &[u8], params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let target = params.target;
        if target.width == 0 || target.height == 0 {
            return Err(BackendError::InvalidImage(format!(
                "target dimensions {target} are empty"
            )));
        }

        // Decode before the size check: a forged header must still fail as
        // undecodable, not as oversized.
        let mut img = load_image(bytes)?;

        if target.pixel_count() > MAX_OUTPUT_PIXELS {
            return Err(BackendError::Resource(format!(
                "target {target} exceeds {MAX_OUTPUT_PIXELS} pixels"
            )));
        }

        if let Some(plan) = &params.prescale {
            img = prescale(img, plan, target, params.format, params.quality)?;
        }

        // Exact pass: the output must match the resolved target to the pixel.
        if dimensions_of(&img) != target {
            img = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        }

        encode_image(&img, params.format, params.quality)
    }
}
