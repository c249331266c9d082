//! # Pixpress
//!
//! Batch image resizing and recompression. Hand in a set of images and one
//! settings snapshot; get back a per-image result list, aggregate savings,
//! and a ZIP of everything that worked.
//!
//! # Pipeline
//!
//! ```text
//! sources ──probe (parallel)──▶ original dimensions (informational)
//!    │
//!    └──run──▶ for each image: probe → resolve geometry → encode
//!                 │
//!                 ├──▶ ProcessedItem list ──▶ summary
//!                 └──▶ successful outputs ──▶ processed_images.zip
//! ```
//!
//! Each image is processed as an isolated unit: a decode or encode failure
//! marks that one item `Failed` and the run moves on. Nothing a single image
//! does can abort the batch.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension probing, geometry resolution, resample + encode (`image`, `webp`) |
//! | [`process`] | Batch state and the run loop: ordering, failure isolation, progress events |
//! | [`summary`] | Pure reduction of the item list to totals and percentage saved |
//! | [`bundle`] | ZIP archive of successful outputs |
//! | [`config`] | `ToolSettings`, tagged settings updates, TOML loading and validation |
//! | [`types`] | Source images, per-item status and results |
//! | [`naming`] | `<name>_processed.<ext>` output filename convention |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Geometry From the Original, Always
//!
//! The encoder may pre-scale a large image before the exact resample. The
//! target size is still computed from the source's true dimensions, never
//! from that intermediate, so rounding never compounds across passes and the
//! output always matches [`imaging::resolve_dimensions`] to the pixel.
//!
//! ## Sequential by Default
//!
//! A run processes one image at a time unless `[processing] workers` asks
//! for more. Peak memory stays at one decoded image and progress is
//! monotonic. With more workers, items still own their result slot, so the
//! outcome per index is the same either way.
//!
//! ## Single-Pass Size Budget
//!
//! `optimization.max_size_mb` triggers one trial encode and at most one
//! shrink. There is no search loop; outputs can still exceed the budget.
//!
//! ## No I/O in the Library
//!
//! The library works on byte buffers. Reading source files, writing outputs
//! and the archive belong to the binary.

pub mod bundle;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod summary;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
