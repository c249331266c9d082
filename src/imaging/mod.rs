//! Image processing over in-memory buffers.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize** | `resize` (Triangle) pre-scale, then Lanczos3 `resize_exact` |
//! | **Encode → WebP** | `webp::Encoder` (lossy) |
//! | **Encode → JPEG** | `image::codecs::jpeg::JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_budget_bound, calculate_prescale_bound, resolve_dimensions};
pub use operations::{ProcessedImage, get_dimensions, plan_encode, probe_all, process_image};
pub use params::{EncodeParams, OutputFormat, PreScale, Quality};
pub use rust_backend::RustBackend;
