//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which turns settings into a plan) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`OutputFormat`]: WebP or JPEG, with its file extension.
//! - [`Quality`]: Lossy encoding quality (0.1–1.0, default 0.85). Clamped on construction.
//! - [`PreScale`]: The optional approximate first pass (max-side bound, size budget).
//! - [`EncodeParams`]: Full specification for one encode: exact target, format, quality, pre-scale.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};

/// Output codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Webp => f.write_str("webp"),
            OutputFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// Quality setting for lossy image encoding (0.1–1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    pub const MIN: f32 = 0.1;
    pub const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// The same quality on the 1–100 scale codecs expect.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.85)
    }
}

/// The approximate first pass run before the exact resample.
///
/// Not iterative: one bounded downscale and, with a budget, at most one
/// further shrink. Never shrinks below what the exact pass needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreScale {
    /// Longer-side bound (only set in `max_side` mode).
    pub max_side: Option<u32>,
    /// Target output size in bytes, if a budget is configured.
    pub budget_bytes: Option<u64>,
}

/// Parameters for one encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    /// Exact output dimensions, always resolved from the original size.
    pub target: Dimensions,
    pub format: OutputFormat,
    pub quality: Quality,
    pub prescale: Option<PreScale>,
}
