//! End-to-end: real decoding and encoding through the public API.

use image::{ImageEncoder, Rgb, RgbImage};
use pixpress::bundle::bundle;
use pixpress::config::{ResizeConfig, ResizeMode, SettingsUpdate, ToolSettings};
use pixpress::imaging::{Dimensions, OutputFormat, RustBackend, resolve_dimensions};
use pixpress::process::{Batch, BatchProcessor, ProcessEvent, RunOutcome};
use pixpress::types::{ItemStatus, SourceImage, StatusKind};
use std::io::{Cursor, Read};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn three_item_batch() -> Batch {
    Batch::new(vec![
        SourceImage::new("first.png", png(400, 200)),
        SourceImage::new("broken.png", b"definitely not an image".to_vec()),
        SourceImage::new("third.png", png(120, 300)),
    ])
}

fn max_side(value: u32) -> ToolSettings {
    ToolSettings {
        resize: ResizeConfig {
            enabled: true,
            mode: ResizeMode::MaxSide,
            value,
        },
        ..ToolSettings::default()
    }
}

fn run(processor: &BatchProcessor<RustBackend>, batch: &mut Batch, settings: &ToolSettings) {
    match processor.run(batch, settings, None).unwrap() {
        RunOutcome::Finished(_) => {}
        RunOutcome::AlreadyRunning => panic!("processor should be idle"),
    }
}

#[test]
fn undecodable_item_fails_alone() {
    let processor = BatchProcessor::new(RustBackend::new());
    let mut batch = three_item_batch();
    let (tx, rx) = std::sync::mpsc::channel();

    let outcome = processor.run(&mut batch, &max_side(200), Some(tx)).unwrap();
    let RunOutcome::Finished(report) = outcome else {
        panic!("processor should be idle");
    };

    let kinds: Vec<_> = batch.items().iter().map(|i| i.status.kind()).collect();
    assert_eq!(
        kinds,
        vec![StatusKind::Success, StatusKind::Failed, StatusKind::Success]
    );
    assert!(batch.items()[1].error_message().is_some());

    // Final progress is 100% and the failed item contributes no output bytes.
    assert_eq!(report.progress.percent(), 100.0);
    let expected: u64 = batch.successful().map(|i| i.processed_size()).sum();
    assert_eq!(report.summary.total_processed_bytes, expected);
    assert_eq!(
        report.summary.total_original_bytes,
        batch.items().iter().map(|i| i.original_size).sum::<u64>()
    );

    let last_progress = rx
        .iter()
        .filter_map(|e| match e {
            ProcessEvent::ItemFinished { progress, .. } => Some(progress.percent()),
            _ => None,
        })
        .last();
    assert_eq!(last_progress, Some(100.0));
}

#[test]
fn outputs_match_resolved_geometry() {
    let processor = BatchProcessor::new(RustBackend::new());
    let mut batch = three_item_batch();
    let settings = max_side(200);

    run(&processor, &mut batch, &settings);

    for item in batch.successful() {
        let expected = resolve_dimensions(item.original_dimensions, &settings.resize).unwrap();
        assert_eq!(item.processed_dimensions(), Some(expected));

        let output = item.output().unwrap();
        let decoded = image::load_from_memory(&output.bytes).unwrap();
        assert_eq!(
            Dimensions::new(decoded.width(), decoded.height()),
            expected
        );
    }
    assert_eq!(
        batch.items()[0].processed_dimensions(),
        Some(Dimensions::new(200, 100))
    );
    // Already within bounds: never upscaled.
    assert_eq!(
        batch.items()[2].processed_dimensions(),
        Some(Dimensions::new(80, 200))
    );
}

#[test]
fn rerun_discards_previous_results() {
    let processor = BatchProcessor::new(RustBackend::new());
    let mut batch = three_item_batch();
    run(&processor, &mut batch, &max_side(200));

    let jpeg = ToolSettings::default()
        .apply("format.type=jpeg".parse::<SettingsUpdate>().unwrap())
        .unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    processor.run(&mut batch, &jpeg, Some(tx)).unwrap();

    // Every item is back to Pending, outputs dropped, before the first starts.
    let events: Vec<_> = rx.iter().collect();
    match &events[0] {
        ProcessEvent::RunStarted { total: 3, items, .. } => {
            assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
            assert!(items.iter().all(|i| i.output().is_none()));
            assert!(items.iter().all(|i| i.processed_dimensions().is_none()));
            assert!(items.iter().all(|i| i.error_message().is_none()));
        }
        other => panic!("unexpected first event {other:?}"),
    }
    assert!(matches!(&events[1], ProcessEvent::ItemStarted { id, .. } if id.0 == 0));

    let first = &batch.items()[0];
    assert_eq!(first.processed_dimensions(), Some(Dimensions::new(400, 200)));
    assert_eq!(first.output_filename(), Some("first_processed.jpg"));
    assert_eq!(first.output().unwrap().format, OutputFormat::Jpeg);
}

#[test]
fn archive_holds_successful_outputs_only() {
    let processor = BatchProcessor::new(RustBackend::new());
    let mut batch = three_item_batch();
    run(&processor, &mut batch, &max_side(200));

    let archive = bundle(batch.items()).unwrap().unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();

    assert_eq!(zip.len(), 2);
    let mut names = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        let item = batch
            .successful()
            .find(|it| it.output_filename() == Some(entry.name()))
            .unwrap();
        assert_eq!(data.as_slice(), &*item.output().unwrap().bytes);
        names.push(entry.name().to_string());
    }
    assert_eq!(names, vec!["first_processed.webp", "third_processed.webp"]);
}

#[test]
fn nothing_to_bundle_before_a_run() {
    let batch = three_item_batch();
    assert!(batch.items().iter().all(|i| i.status == ItemStatus::Pending));
    assert!(bundle(batch.items()).unwrap().is_none());
}
