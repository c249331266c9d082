//! CLI output formatting.
//!
//! # Item Display Contract
//!
//! Every image is shown the same way in every command:
//!
//! 1. **Header line**: 1-based positional index + source filename
//! 2. **Context lines**: indented geometry, sizes, output name or error
//!
//! # Output Format
//!
//! ## Probe
//!
//! ```text
//! 001 dawn.jpg 4000x3000 (2.41 MB)
//! 002 notes.txt (12 KB)
//!     Error: decode failed: The image format could not be determined
//! ```
//!
//! ## Run
//!
//! ```text
//! Processing 2 images (1 worker)
//! 001 dawn.jpg → dawn_processed.webp [50%]
//!     4000x3000 → 1200x900
//!     2.41 MB → 182.5 KB
//! 002 notes.txt failed [100%]
//!     Error: decode failed: The image format could not be determined
//!
//! 1/2 images processed
//! Saved 2.24 MB (92.61%)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::imaging::{BackendError, Dimensions};
use crate::process::{ProcessEvent, Progress};
use crate::summary::BatchSummary;
use crate::types::{ItemStatus, ProcessedItem, SourceImage};

// ============================================================================
// Shared display helpers
// ============================================================================

const BYTE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size: base 1024, at most two decimals, trailing zeros
/// dropped.
///
/// ```text
/// 0       → 0 Bytes
/// 1536    → 1.5 KB
/// 1048576 → 1 MB
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, BYTE_UNITS[unit])
}

/// Progress as a whole percentage, rounded half up.
pub fn format_progress(progress: Progress) -> String {
    format!("{}%", progress.percent().round() as u64)
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Header line for one item: positional index + source filename.
fn item_header(index: usize, filename: &str) -> String {
    format!("{} {}", format_index(index + 1), filename)
}

// ============================================================================
// Probe output
// ============================================================================

/// Format dimension probe results, one entry per source.
pub fn format_probe_results(
    sources: &[SourceImage],
    results: &[Result<Dimensions, BackendError>],
) -> Vec<String> {
    let mut lines = Vec::new();
    for (index, (source, result)) in sources.iter().zip(results).enumerate() {
        let header = item_header(index, source.filename());
        let size = format_bytes(source.len());
        match result {
            Ok(dims) => lines.push(format!("{} {} ({})", header, dims, size)),
            Err(err) => {
                lines.push(format!("{} ({})", header, size));
                lines.push(format!("    Error: {}", err));
            }
        }
    }
    lines
}

/// Print probe results to stdout.
pub fn print_probe_results(sources: &[SourceImage], results: &[Result<Dimensions, BackendError>]) {
    for line in format_probe_results(sources, results) {
        println!("{}", line);
    }
}

// ============================================================================
// Run output
// ============================================================================

/// Format a single run event as display lines.
///
/// Items are only shown once they reach a terminal state; `ItemStarted`
/// produces no output.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::RunStarted { total, workers, .. } => {
            let noun = if *total == 1 { "image" } else { "images" };
            let worker_noun = if *workers == 1 { "worker" } else { "workers" };
            vec![format!(
                "Processing {} {} ({} {})",
                total, noun, workers, worker_noun
            )]
        }
        ProcessEvent::ItemStarted { .. } => Vec::new(),
        ProcessEvent::ItemFinished { item, progress } => format_item(item, *progress),
        ProcessEvent::RunFinished { summary, cancelled } => {
            let mut lines = vec![String::new()];
            lines.extend(format_summary(summary, *cancelled));
            lines
        }
    }
}

fn format_item(item: &ProcessedItem, progress: Progress) -> Vec<String> {
    let header = item_header(item.id.0, &item.source_filename);
    let progress = format_progress(progress);
    match &item.status {
        ItemStatus::Success(output) => vec![
            format!("{} \u{2192} {} [{}]", header, output.filename, progress),
            format!("    {} \u{2192} {}", item.original_dimensions, output.dimensions),
            format!(
                "    {} \u{2192} {}",
                format_bytes(item.original_size),
                format_bytes(output.size())
            ),
        ],
        ItemStatus::Failed(err) => vec![
            format!("{} failed [{}]", header, progress),
            format!("    Error: {}", err),
        ],
        ItemStatus::Pending | ItemStatus::Processing => {
            vec![format!("{} {} [{}]", header, item.status.kind(), progress)]
        }
    }
}

/// Format the end-of-run totals.
pub fn format_summary(summary: &BatchSummary, cancelled: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{}/{} images processed",
        summary.success_count, summary.total_count
    )];

    let amount = format_bytes(summary.reduction_bytes.unsigned_abs());
    if summary.reduction_bytes >= 0 {
        lines.push(format!(
            "Saved {} ({:.2}%)",
            amount, summary.reduction_percent
        ));
    } else {
        lines.push(format!(
            "Grew by {} ({:.2}%)",
            amount,
            summary.reduction_percent.abs()
        ));
    }

    if cancelled {
        lines.push(format!(
            "Cancelled: {} images not processed",
            summary.unfinished_count()
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::OutputFormat;
    use crate::types::{ItemError, ItemId, ProcessedOutput};
    use std::sync::Arc;

    // =========================================================================
    // format_bytes
    // =========================================================================

    #[test]
    fn bytes_zero() {
        assert_eq!(format_bytes(0), "0 Bytes");
    }

    #[test]
    fn bytes_below_one_kb() {
        assert_eq!(format_bytes(500), "500 Bytes");
        assert_eq!(format_bytes(1023), "1023 Bytes");
    }

    #[test]
    fn bytes_trailing_zeros_trimmed() {
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1 MB");
    }

    #[test]
    fn bytes_two_decimals() {
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 + 1024 * 1024 * 512), "3.5 GB");
    }

    #[test]
    fn bytes_stop_at_gb() {
        assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn progress_rounds_to_whole_percent() {
        assert_eq!(format_progress(Progress { completed: 1, total: 3 }), "33%");
        assert_eq!(format_progress(Progress { completed: 2, total: 3 }), "67%");
        assert_eq!(format_progress(Progress { completed: 1, total: 8 }), "13%");
    }

    // =========================================================================
    // Probe output
    // =========================================================================

    #[test]
    fn probe_success_and_failure() {
        let sources = vec![
            SourceImage::new("dawn.jpg", vec![0u8; 2048]),
            SourceImage::new("notes.txt", vec![0u8; 10]),
        ];
        let results = vec![
            Ok(Dimensions::new(4000, 3000)),
            Err(BackendError::Decode("unknown format".into())),
        ];
        let lines = format_probe_results(&sources, &results);
        assert_eq!(
            lines,
            vec![
                "001 dawn.jpg 4000x3000 (2 KB)",
                "002 notes.txt (10 Bytes)",
                "    Error: decode failed: unknown format",
            ]
        );
    }

    // =========================================================================
    // Run event formatting
    // =========================================================================

    fn item(index: usize, status: ItemStatus) -> ProcessedItem {
        let source = SourceImage::new("dawn.jpg", vec![0u8; 2048]);
        let mut item = ProcessedItem::pending(ItemId(index), &source);
        item.original_dimensions = Dimensions::new(4000, 3000);
        item.status = status;
        item
    }

    #[test]
    fn run_started() {
        let lines = format_process_event(&ProcessEvent::RunStarted {
            total: 3,
            workers: 1,
            items: Vec::new(),
        });
        assert_eq!(lines, vec!["Processing 3 images (1 worker)"]);
    }

    #[test]
    fn item_started_is_silent() {
        let lines = format_process_event(&ProcessEvent::ItemStarted {
            id: ItemId(0),
            filename: "dawn.jpg".to_string(),
        });
        assert!(lines.is_empty());
    }

    #[test]
    fn item_finished_success() {
        let event = ProcessEvent::ItemFinished {
            item: item(
                0,
                ItemStatus::Success(ProcessedOutput {
                    dimensions: Dimensions::new(1200, 900),
                    format: OutputFormat::Webp,
                    filename: "dawn_processed.webp".to_string(),
                    bytes: Arc::from(vec![0u8; 512]),
                }),
            ),
            progress: Progress {
                completed: 1,
                total: 2,
            },
        };
        let lines = format_process_event(&event);
        assert_eq!(lines[0], "001 dawn.jpg \u{2192} dawn_processed.webp [50%]");
        assert_eq!(lines[1], "    4000x3000 \u{2192} 1200x900");
        assert_eq!(lines[2], "    2 KB \u{2192} 512 Bytes");
    }

    #[test]
    fn item_finished_failure() {
        let event = ProcessEvent::ItemFinished {
            item: item(
                1,
                ItemStatus::Failed(ItemError::Backend(BackendError::Decode("bad".into()))),
            ),
            progress: Progress {
                completed: 2,
                total: 2,
            },
        };
        let lines = format_process_event(&event);
        assert_eq!(lines, vec!["002 dawn.jpg failed [100%]", "    Error: decode failed: bad"]);
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn summary_saved() {
        let summary = BatchSummary {
            total_count: 3,
            success_count: 2,
            failed_count: 1,
            total_original_bytes: 4096,
            total_processed_bytes: 1024,
            reduction_bytes: 3072,
            reduction_percent: 75.0,
        };
        assert_eq!(
            format_summary(&summary, false),
            vec!["2/3 images processed", "Saved 3 KB (75.00%)"]
        );
    }

    #[test]
    fn summary_growth_and_cancel() {
        let summary = BatchSummary {
            total_count: 3,
            success_count: 1,
            failed_count: 0,
            total_original_bytes: 1000,
            total_processed_bytes: 1500,
            reduction_bytes: -500,
            reduction_percent: -50.0,
        };
        assert_eq!(
            format_summary(&summary, true),
            vec![
                "1/3 images processed",
                "Grew by 500 Bytes (50.00%)",
                "Cancelled: 2 images not processed",
            ]
        );
    }

    #[test]
    fn run_finished_has_blank_separator() {
        let lines = format_process_event(&ProcessEvent::RunFinished {
            summary: BatchSummary::default(),
            cancelled: false,
        });
        assert_eq!(lines, vec!["", "0/0 images processed", "Saved 0 Bytes (0.00%)"]);
    }
}
