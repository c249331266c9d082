use clap::{Parser, Subcommand};
use pixpress::bundle::{self, ARCHIVE_FILENAME};
use pixpress::config::{self, SettingsUpdate};
use pixpress::imaging::{self, RustBackend};
use pixpress::output;
use pixpress::process::{Batch, BatchProcessor, RunOptions, RunOutcome};
use pixpress::summary::BatchSummary;
use pixpress::types::{ItemRecord, SourceImage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixpress")]
#[command(about = "Batch resize and recompress images to WebP or JPEG")]
#[command(long_about = "\
Batch resize and recompress images to WebP or JPEG

Every input is processed on its own: an image that cannot be decoded or
encoded is reported as failed and the rest of the batch carries on.

Outputs are named after their source: dawn.png → dawn_processed.webp.

Settings come from the config file (see 'pixpress gen-config') and can be
overridden per run:

  pixpress run *.jpg --set resize.enabled=true --set resize.value=1600
  pixpress run *.png --set format.type=jpeg --set format.quality=0.7 \\
      --archive out/

Set RUST_LOG=debug for diagnostic logging on stderr.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "pixpress.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the dimensions of each image without processing it
    Probe {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Resize and re-encode images
    Run(RunArgs),
    /// Print a stock config file with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Override a setting, e.g. `resize.mode=percentage` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<SettingsUpdate>,

    /// Write each processed image into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Write a ZIP of all processed images (a directory gets processed_images.zip)
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: BatchSummary,
    cancelled: bool,
    items: Vec<ItemRecord<'a>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Probe { files } => {
            let sources = read_sources(&files)?;
            let results = imaging::probe_all(&RustBackend::new(), &sources);
            output::print_probe_results(&sources, &results);
        }
        Command::Run(args) => run(&cli.config, args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run(config_path: &Path, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(config_path)?;
    let settings = args
        .set
        .iter()
        .try_fold(config.settings(), |settings, update| settings.apply(*update))?;

    let mut batch = Batch::new(read_sources(&args.files)?);
    batch.probe(&RustBackend::new());

    let processor =
        BatchProcessor::with_options(RustBackend::new(), RunOptions::from_config(&config.processing));

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let outcome = processor.run(&mut batch, &settings, Some(tx))?;
    printer.join().map_err(|_| "progress printer panicked")?;

    let report = match outcome {
        RunOutcome::Finished(report) => report,
        RunOutcome::AlreadyRunning => return Err("a run is already in progress".into()),
    };

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        // Same rule as the archive: a later image with the same output name wins.
        let mut written = HashSet::new();
        for item in batch.successful() {
            if let Some(out) = item.output() {
                if !written.insert(out.filename.as_str()) {
                    eprintln!("Overwriting {} with {}", out.filename, item.source_filename);
                }
                std::fs::write(dir.join(&out.filename), &*out.bytes)?;
            }
        }
    }

    if let Some(path) = &args.archive {
        // Archive failures leave the results intact; report and carry on.
        match bundle::bundle(batch.items()) {
            Ok(Some(bytes)) => {
                let path = archive_path(path);
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, bytes)?;
                println!("Archive: {}", path.display());
            }
            Ok(None) => println!("No images processed; archive not written"),
            Err(e) => eprintln!("Archive failed: {}", e),
        }
    }

    if let Some(path) = &args.report {
        let report = Report {
            summary: report.summary,
            cancelled: report.cancelled,
            items: batch.items().iter().map(|i| i.record()).collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    Ok(())
}

/// Read each path into a named source image.
fn read_sources(paths: &[PathBuf]) -> std::io::Result<Vec<SourceImage>> {
    paths
        .iter()
        .map(|path| -> std::io::Result<SourceImage> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(SourceImage::new(name, std::fs::read(path)?))
        })
        .collect()
}

/// A directory (existing, or spelled with a trailing slash) gets the
/// default archive name.
fn archive_path(path: &Path) -> PathBuf {
    let as_dir = path.is_dir() || path.as_os_str().to_string_lossy().ends_with('/');
    if as_dir {
        path.join(ARCHIVE_FILENAME)
    } else {
        path.to_path_buf()
    }
}

/// Compact diagnostics on stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
