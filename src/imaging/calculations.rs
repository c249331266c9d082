//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Aspect ratios are always taken from the *original* dimensions. The
//! pre-scale pass may leave an intermediate image whose ratio is off by a
//! rounding pixel; resolving against that intermediate would compound the
//! drift, so nothing here ever receives it as the reference size.

use super::backend::{BackendError, Dimensions};
use crate::config::{ResizeConfig, ResizeMode};

/// Round half away from zero and clamp to at least one pixel.
fn round_px(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Compute output dimensions for `original` under `resize`.
///
/// # Rules
/// * disabled → `original` unchanged
/// * `fixed_width` → `width = value`, `height = round(value / aspect)`
/// * `fixed_height` → `height = value`, `width = round(value * aspect)`
/// * `max_side` → longer side bounded to `value`, never upscaled
/// * `percentage` → both sides scaled by `value / 100`
///
/// # Errors
/// `InvalidImage` when either original side is zero; the aspect ratio would
/// be undefined.
///
/// # Examples
/// ```
/// # use pixpress::config::{ResizeConfig, ResizeMode};
/// # use pixpress::imaging::{Dimensions, resolve_dimensions};
/// let cfg = ResizeConfig { enabled: true, mode: ResizeMode::MaxSide, value: 1200 };
/// let out = resolve_dimensions(Dimensions::new(2000, 1000), &cfg).unwrap();
/// assert_eq!(out, Dimensions::new(1200, 600));
/// ```
pub fn resolve_dimensions(
    original: Dimensions,
    resize: &ResizeConfig,
) -> Result<Dimensions, BackendError> {
    if original.width == 0 || original.height == 0 {
        return Err(BackendError::InvalidImage(format!(
            "cannot resize an image with dimensions {original}"
        )));
    }
    if !resize.enabled {
        return Ok(original);
    }

    let aspect = original.width as f64 / original.height as f64;
    let value = resize.value;

    let resolved = match resize.mode {
        ResizeMode::FixedWidth => Dimensions::new(value.max(1), round_px(value as f64 / aspect)),
        ResizeMode::FixedHeight => Dimensions::new(round_px(value as f64 * aspect), value.max(1)),
        ResizeMode::MaxSide => {
            if original.longer_side() <= value {
                original
            } else if original.width > original.height {
                Dimensions::new(value.max(1), round_px(value as f64 / aspect))
            } else {
                Dimensions::new(round_px(value as f64 * aspect), value.max(1))
            }
        }
        ResizeMode::Percentage => {
            let ratio = value as f64 / 100.0;
            Dimensions::new(
                round_px(original.width as f64 * ratio),
                round_px(original.height as f64 * ratio),
            )
        }
    };

    Ok(resolved)
}

/// Longer-side bound for an approximate downscale of `source`.
///
/// Returns `None` when no shrink is needed. The bound is raised as far as
/// necessary so that both sides of the intermediate image stay at or above
/// `target`; the exact pass must only ever scale down.
///
/// # Arguments
/// * `source` - Dimensions of the image about to be shrunk
/// * `target` - Exact output dimensions of the final pass
/// * `requested` - Desired longer side for the intermediate image
pub fn calculate_prescale_bound(source: Dimensions, target: Dimensions, requested: u32) -> Option<u32> {
    if source.width == 0 || source.height == 0 {
        return None;
    }
    let longer = source.longer_side();
    let needed_scale = (target.width as f64 / source.width as f64)
        .max(target.height as f64 / source.height as f64);
    let floor = (longer as f64 * needed_scale - 1e-9).ceil() as u32;
    let bound = requested.max(floor).max(1);
    (bound < longer).then_some(bound)
}

/// Longer-side bound for the single budget-driven shrink.
///
/// Byte size scales roughly with pixel count, so the side shrinks by
/// `sqrt(budget / encoded)`. One estimate, not a search.
pub fn calculate_budget_bound(
    current: Dimensions,
    target: Dimensions,
    encoded_bytes: u64,
    budget_bytes: u64,
) -> Option<u32> {
    if budget_bytes == 0 || encoded_bytes <= budget_bytes {
        return None;
    }
    let factor = (budget_bytes as f64 / encoded_bytes as f64).sqrt();
    let requested = (current.longer_side() as f64 * factor).round() as u32;
    calculate_prescale_bound(current, target, requested)
}
