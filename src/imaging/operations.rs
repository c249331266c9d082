//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take settings, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::resolve_dimensions;
use super::params::{EncodeParams, PreScale, Quality};
use crate::config::{ResizeMode, ToolSettings};
use crate::naming::output_filename;
use crate::types::{ProcessedOutput, SourceImage};
use rayon::prelude::*;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &(impl ImageBackend + ?Sized), bytes: &[u8]) -> Result<Dimensions> {
    backend.identify(bytes)
}

/// Probe every source in parallel.
///
/// One independent task per image; the result vector is indexed like
/// `sources`. A failure only affects its own slot.
pub fn probe_all(
    backend: &(impl ImageBackend + ?Sized),
    sources: &[SourceImage],
) -> Vec<Result<Dimensions>> {
    sources
        .par_iter()
        .map(|source| backend.identify(source.bytes()))
        .collect()
}

/// Plan an encode without executing it.
///
/// The target always comes from `original`; the pre-scale pass only runs
/// when resizing is enabled or a size budget is set, and it only carries a
/// longer-side bound in `max_side` mode.
pub fn plan_encode(original: Dimensions, settings: &ToolSettings) -> Result<EncodeParams> {
    let target = resolve_dimensions(original, &settings.resize)?;
    let budget_bytes = settings.optimization.budget_bytes();

    let prescale = (settings.resize.enabled || budget_bytes.is_some()).then(|| PreScale {
        max_side: (settings.resize.enabled && settings.resize.mode == ResizeMode::MaxSide)
            .then_some(settings.resize.value),
        budget_bytes,
    });

    Ok(EncodeParams {
        target,
        format: settings.format.kind,
        quality: Quality::new(settings.format.quality),
        prescale,
    })
}

/// Result of one successful pass through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub original_dimensions: Dimensions,
    pub output: ProcessedOutput,
}

/// Probe, resolve and encode one image as a single unit.
///
/// Any step's failure is returned as-is; the caller decides what a failure
/// means for the rest of the batch.
pub fn process_image(
    backend: &(impl ImageBackend + ?Sized),
    source: &SourceImage,
    settings: &ToolSettings,
) -> Result<ProcessedImage> {
    let original = backend.identify(source.bytes())?;
    let params = plan_encode(original, settings)?;
    let encoded = backend.encode(source.bytes(), &params)?;

    Ok(ProcessedImage {
        original_dimensions: original,
        output: ProcessedOutput {
            dimensions: params.target,
            format: params.format,
            filename: output_filename(source.filename(), params.format),
            bytes: encoded.into(),
        },
    })
}
