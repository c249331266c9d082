//! ZIP bundling of successful outputs.
//!
//! Every `Success` item contributes its encoded bytes under its output
//! filename, in item order. Entries are DEFLATE-compressed at level 9.
//!
//! Names are not made unique. When two items share an output filename the
//! later item's bytes win and the entry keeps the position of the first, the
//! same outcome as writing both files into one directory.

use crate::types::{ProcessedItem, ProcessedOutput};
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use tracing::{debug, warn};
use zip::{CompressionMethod, ZipWriter};

/// Name offered for the downloaded archive.
pub const ARCHIVE_FILENAME: &str = "processed_images.zip";

const DEFLATE_LEVEL: i64 = 9;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pack every successful item into one ZIP buffer.
///
/// Returns `Ok(None)` when no item succeeded: there is nothing to download,
/// and that is not an error.
pub fn bundle(items: &[ProcessedItem]) -> Result<Option<Vec<u8>>, BundleError> {
    let mut outputs: Vec<&ProcessedOutput> = Vec::new();
    for output in items.iter().filter_map(ProcessedItem::output) {
        match outputs.iter_mut().find(|o| o.filename == output.filename) {
            Some(existing) => {
                warn!("duplicate output name {}, keeping the later image", output.filename);
                *existing = output;
            }
            None => outputs.push(output),
        }
    }
    if outputs.is_empty() {
        return Ok(None);
    }

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(DEFLATE_LEVEL));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for output in outputs {
        writer.start_file(output.filename.as_str(), options)?;
        writer.write_all(&output.bytes)?;
    }
    let archive = writer.finish()?.into_inner();

    debug!("bundled {} bytes into {}", archive.len(), ARCHIVE_FILENAME);
    Ok(Some(archive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BackendError, Dimensions, OutputFormat};
    use crate::types::{ItemError, ItemId, ItemStatus, ProcessedOutput, SourceImage};
    use std::io::Read;
    use std::sync::Arc;
    use zip::ZipArchive;

    fn success(index: usize, filename: &str, bytes: &[u8]) -> ProcessedItem {
        let source = SourceImage::new(format!("{index}.png"), vec![0u8; 8]);
        let mut item = ProcessedItem::pending(ItemId(index), &source);
        item.status = ItemStatus::Success(ProcessedOutput {
            dimensions: Dimensions::new(1, 1),
            format: OutputFormat::Webp,
            filename: filename.to_string(),
            bytes: Arc::from(bytes.to_vec()),
        });
        item
    }

    fn failed(index: usize) -> ProcessedItem {
        let source = SourceImage::new(format!("{index}.png"), vec![0u8; 8]);
        let mut item = ProcessedItem::pending(ItemId(index), &source);
        item.status = ItemStatus::Failed(ItemError::Backend(BackendError::Decode("bad".into())));
        item
    }

    fn entries(archive: Vec<u8>) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data, file.compression())
            })
            .collect()
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(bundle(&[]).unwrap().is_none());
    }

    #[test]
    fn only_failures_produces_nothing() {
        assert!(bundle(&[failed(0), failed(1)]).unwrap().is_none());
    }

    #[test]
    fn successful_outputs_in_item_order() {
        let items = vec![
            success(0, "b_processed.webp", b"second"),
            failed(1),
            success(2, "a_processed.webp", b"first"),
        ];

        let archive = bundle(&items).unwrap().unwrap();
        let entries = entries(archive);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "b_processed.webp");
        assert_eq!(entries[0].1, b"second");
        assert_eq!(entries[1].0, "a_processed.webp");
        assert_eq!(entries[1].1, b"first");
        assert!(entries.iter().all(|e| e.2 == CompressionMethod::Deflated));
    }

    #[test]
    fn duplicate_names_keep_the_later_bytes_in_first_position() {
        let items = vec![
            success(0, "a_processed.webp", b"one"),
            success(1, "b_processed.webp", b"middle"),
            success(2, "a_processed.webp", b"two"),
        ];

        let entries = entries(bundle(&items).unwrap().unwrap());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a_processed.webp");
        assert_eq!(entries[0].1, b"two");
        assert_eq!(entries[1].0, "b_processed.webp");
    }
}
