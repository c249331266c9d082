//! Aggregate totals over a finished item list.
//!
//! A pure reduction: no I/O, no state. Failed items still count towards the
//! original total (the user did hand them in) but contribute nothing to the
//! processed total, so a failure shows up as "saved" bytes. That matches what
//! the user downloads: only successful outputs end up in the archive.

use crate::types::{ItemStatus, ProcessedItem};
use serde::Serialize;

/// Totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Sum of source sizes over *all* items.
    pub total_original_bytes: u64,
    /// Sum of output sizes over `Success` items only.
    pub total_processed_bytes: u64,
    /// `total_original_bytes - total_processed_bytes`; negative when the
    /// outputs grew.
    pub reduction_bytes: i64,
    /// `reduction_bytes / total_original_bytes * 100`, or `0` for an empty
    /// original total.
    pub reduction_percent: f64,
}

impl BatchSummary {
    /// Items that neither succeeded nor failed (cancelled or never run).
    pub fn unfinished_count(&self) -> usize {
        self.total_count - self.success_count - self.failed_count
    }
}

/// Reduce an item list to its totals.
pub fn summarize(items: &[ProcessedItem]) -> BatchSummary {
    let mut summary = BatchSummary {
        total_count: items.len(),
        ..BatchSummary::default()
    };

    for item in items {
        summary.total_original_bytes += item.original_size;
        match &item.status {
            ItemStatus::Success(output) => {
                summary.success_count += 1;
                summary.total_processed_bytes += output.size();
            }
            ItemStatus::Failed(_) => summary.failed_count += 1,
            ItemStatus::Pending | ItemStatus::Processing => {}
        }
    }

    summary.reduction_bytes =
        summary.total_original_bytes as i64 - summary.total_processed_bytes as i64;
    summary.reduction_percent = if summary.total_original_bytes > 0 {
        summary.reduction_bytes as f64 / summary.total_original_bytes as f64 * 100.0
    } else {
        0.0
    };
    summary
}
