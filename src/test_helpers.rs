//! Shared test utilities for the pixpress test suite.
//!
//! Synthetic images are generated in memory with the `image` crate so tests
//! never depend on fixture files.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let source = source("photo.jpg", jpeg_bytes(800, 600));
//! let batch = Batch::new(vec![source]);
//! ```

use crate::types::SourceImage;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Synthetic image buffers
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A small valid JPEG with the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A small valid RGB PNG with the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A PNG with a real alpha channel.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, 64, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// A PNG full of pseudo-random noise, which compresses badly.
///
/// Useful wherever a test needs encoded size to respond to quality.
pub fn noisy_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let img = RgbImage::from_fn(width, height, |_, _| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// Source construction
// =========================================================================

/// Wrap a buffer as a named source image.
pub fn source(name: &str, bytes: Vec<u8>) -> SourceImage {
    SourceImage::new(name, bytes)
}
