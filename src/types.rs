//! Shared types used across the pipeline.
//!
//! [`SourceImage`] is what the caller hands in, [`ProcessedItem`] is what a
//! run reports back for each one. Output buffers and source buffers are
//! reference counted, so snapshots handed to observers share them instead
//! of copying pixels around.

use crate::imaging::{BackendError, Dimensions, OutputFormat};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A caller-supplied image: a name and the raw encoded bytes.
///
/// Immutable once created. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct SourceImage {
    filename: String,
    bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Stable identifier of an item: its position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Why an item ended up `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
}

/// A successfully produced output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOutput {
    pub dimensions: Dimensions,
    pub format: OutputFormat,
    pub filename: String,
    pub bytes: Arc<[u8]>,
}

impl ProcessedOutput {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Per-item lifecycle.
///
/// `Pending → Processing → {Success, Failed}`. Only a batch reset moves an
/// item back to `Pending`. Output data lives inside `Success` and the error
/// inside `Failed`, so neither can exist in any other state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Success(ProcessedOutput),
    Failed(ItemError),
}

/// Status without its payload, for display and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Processing,
    Success,
    Failed,
}

impl ItemStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            ItemStatus::Pending => StatusKind::Pending,
            ItemStatus::Processing => StatusKind::Processing,
            ItemStatus::Success(_) => StatusKind::Success,
            ItemStatus::Failed(_) => StatusKind::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Success(_) | ItemStatus::Failed(_))
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StatusKind::Pending => "pending",
            StatusKind::Processing => "processing",
            StatusKind::Success => "success",
            StatusKind::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One entry of the batch result list, one per source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedItem {
    pub id: ItemId,
    /// Name of the source image.
    pub source_filename: String,
    pub original_size: u64,
    /// Filled in by the dimension probe; `0x0` until then or if it failed.
    pub original_dimensions: Dimensions,
    pub status: ItemStatus,
}

impl ProcessedItem {
    pub fn pending(id: ItemId, source: &SourceImage) -> Self {
        Self {
            id,
            source_filename: source.filename().to_string(),
            original_size: source.len(),
            original_dimensions: Dimensions::UNKNOWN,
            status: ItemStatus::Pending,
        }
    }

    pub fn output(&self) -> Option<&ProcessedOutput> {
        match &self.status {
            ItemStatus::Success(output) => Some(output),
            _ => None,
        }
    }

    pub fn processed_dimensions(&self) -> Option<Dimensions> {
        self.output().map(|o| o.dimensions)
    }

    /// Encoded size; zero unless the item succeeded.
    pub fn processed_size(&self) -> u64 {
        self.output().map_or(0, ProcessedOutput::size)
    }

    pub fn output_filename(&self) -> Option<&str> {
        self.output().map(|o| o.filename.as_str())
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.status {
            ItemStatus::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Success(_))
    }

    pub fn record(&self) -> ItemRecord<'_> {
        ItemRecord {
            id: self.id,
            status: self.status.kind(),
            source_filename: &self.source_filename,
            original_size: self.original_size,
            original_dimensions: self.original_dimensions,
            processed_dimensions: self.processed_dimensions(),
            processed_size: self.processed_size(),
            output_filename: self.output_filename(),
            error: self.error_message(),
        }
    }
}

/// Serializable view of an item for reports. Output bytes are left out.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord<'a> {
    pub id: ItemId,
    pub status: StatusKind,
    pub source_filename: &'a str,
    pub original_size: u64,
    pub original_dimensions: Dimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_dimensions: Option<Dimensions>,
    pub processed_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
