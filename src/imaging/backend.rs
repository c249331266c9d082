//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify (the dimension probe) and encode (resample + re-encode).
//! Both work on in-memory buffers; the crate never touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): the `image` crate for
//! decoding, resampling and JPEG, plus `webp` for lossy WebP.

use super::params::EncodeParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The buffer is not a decodable image.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Degenerate geometry, e.g. a zero height.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// The requested format/quality could not be produced.
    #[error("encode failed: {0}")]
    Encode(String),
    /// Allocation or runtime limit hit while resampling or encoding.
    #[error("resource limit: {0}")]
    Resource(String),
}

/// Width and height in pixels. `0x0` means "unknown / not yet probed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const UNKNOWN: Dimensions = Dimensions {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    pub fn longer_side(self) -> u32 {
        self.width.max(self.height)
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Send + Sync` so a backend can be shared with the rayon probe pool, the
/// bounded worker pool and per-item timeout threads.
pub trait ImageBackend: Send + Sync {
    /// Read intrinsic dimensions without resampling or re-encoding.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Resample `bytes` to `params.target` and encode to `params.format`.
    ///
    /// The returned buffer must decode to exactly `params.target`.
    fn encode(&self, bytes: &[u8], params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock backend that records operations without touching pixels.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Buffers are looked up by content: register what `identify` should
    /// return for a given byte string with [`MockBackend::with_image`].
    /// Anything unregistered fails to decode.
    #[derive(Default)]
    pub struct MockBackend {
        pub images: Mutex<HashMap<Vec<u8>, Dimensions>>,
        pub encode_failures: Mutex<HashMap<Vec<u8>, BackendError>>,
        pub encode_delay: Mutex<Option<Duration>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(Vec<u8>),
        Encode {
            source: Vec<u8>,
            width: u32,
            height: u32,
            quality: f32,
            prescale: bool,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(self, bytes: &[u8], width: u32, height: u32) -> Self {
            self.images
                .lock()
                .unwrap()
                .insert(bytes.to_vec(), Dimensions::new(width, height));
            self
        }

        pub fn failing_encode(self, bytes: &[u8], error: BackendError) -> Self {
            self.encode_failures
                .lock()
                .unwrap()
                .insert(bytes.to_vec(), error);
            self
        }

        pub fn with_encode_delay(self, delay: Duration) -> Self {
            *self.encode_delay.lock().unwrap() = Some(delay);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(bytes.to_vec()));

            self.images
                .lock()
                .unwrap()
                .get(bytes)
                .copied()
                .ok_or_else(|| BackendError::Decode("not a registered mock image".to_string()))
        }

        fn encode(&self, bytes: &[u8], params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                source: bytes.to_vec(),
                width: params.target.width,
                height: params.target.height,
                quality: params.quality.value(),
                prescale: params.prescale.is_some(),
            });

            let delay = *self.encode_delay.lock().unwrap();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }

            if let Some(err) = self.encode_failures.lock().unwrap().get(bytes) {
                return Err(err.clone());
            }

            // One byte per output row keeps sizes predictable in tests.
            Ok(vec![0u8; params.target.height as usize])
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::new().with_image(b"img", 800, 600);

        let result = backend.identify(b"img").unwrap();
        assert_eq!(result, Dimensions::new(800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(b) if b == b"img"));
    }

    #[test]
    fn mock_unregistered_buffer_fails_to_decode() {
        let backend = MockBackend::new();
        assert!(matches!(
            backend.identify(b"garbage"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn mock_records_encode() {
        use crate::imaging::params::{OutputFormat, Quality};

        let backend = MockBackend::new();
        let out = backend
            .encode(
                b"img",
                &EncodeParams {
                    target: Dimensions::new(400, 300),
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(0.8),
                    prescale: None,
                },
            )
            .unwrap();

        assert_eq!(out.len(), 300);
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Encode {
                width: 400,
                height: 300,
                prescale: false,
                ..
            }
        ));
    }

    #[test]
    fn dimensions_unknown_sentinel() {
        assert!(Dimensions::default().is_unknown());
        assert!(!Dimensions::new(1, 0).is_unknown());
        assert_eq!(Dimensions::new(30, 20).to_string(), "30x20");
        assert_eq!(Dimensions::new(30, 20).longer_side(), 30);
    }
}
