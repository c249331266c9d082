//! Batch orchestration: drive every source image through probe → resolve →
//! encode and record what happened to each one.
//!
//! ## State
//!
//! A [`Batch`] owns the source images and one [`ProcessedItem`] per source,
//! indexed by [`ItemId`]. Items move `Pending → Processing → {Success, Failed}`.
//! The only way back to `Pending` is a reset, which every run performs
//! before touching the first item.
//!
//! ```text
//! run()
//!   reset all items → Pending        RunStarted
//!   for each item, in input order:
//!     cancelled? → stop               (remaining items stay Pending)
//!     item → Processing               ItemStarted
//!     probe → resolve → encode
//!     item → Success | Failed         ItemFinished { progress }
//!   summarize                         RunFinished
//! ```
//!
//! ## Failure isolation
//!
//! A failing item records its error and the loop moves on. Nothing an item
//! does can abort the batch; [`BatchProcessor::run`] only refuses to start
//! (invalid settings, or a run already in progress).
//!
//! ## Workers
//!
//! With one worker (the default) items run strictly one at a time, which
//! bounds peak memory to a single decoded image. More workers run items on a
//! bounded [rayon](https://docs.rs/rayon) pool: every worker owns a disjoint
//! `&mut ProcessedItem`, the completed counter is atomic, and every event
//! names its item so observers can rebuild per-item outcomes regardless of
//! arrival order.

use crate::config::{ConfigError, ProcessingConfig, ToolSettings, effective_workers};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, ProcessedImage, probe_all, process_image,
};
use crate::summary::{BatchSummary, summarize};
use crate::types::{ItemError, ItemId, ItemStatus, ProcessedItem, SourceImage};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Batch state
// ============================================================================

/// Source images plus their per-item results.
///
/// Replacing or clearing the sources rebuilds the item list from scratch and
/// bumps [`Batch::generation`], so late probe results for an older source
/// set can be recognised and dropped.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    sources: Vec<SourceImage>,
    items: Vec<ProcessedItem>,
    generation: u64,
}

impl Batch {
    pub fn new(sources: Vec<SourceImage>) -> Self {
        let mut batch = Self::default();
        batch.replace_sources(sources);
        batch
    }

    /// Swap in a new source set. Returns the new generation.
    pub fn replace_sources(&mut self, sources: Vec<SourceImage>) -> u64 {
        self.items = sources
            .iter()
            .enumerate()
            .map(|(index, source)| ProcessedItem::pending(ItemId(index), source))
            .collect();
        self.sources = sources;
        self.generation += 1;
        self.generation
    }

    /// Drop all sources, items and outputs.
    pub fn clear(&mut self) {
        self.replace_sources(Vec::new());
    }

    pub fn sources(&self) -> &[SourceImage] {
        &self.sources
    }

    pub fn items(&self) -> &[ProcessedItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&ProcessedItem> {
        self.items.get(id.0)
    }

    /// Immutable copy of the item list. Output buffers are shared, not copied.
    pub fn snapshot(&self) -> Vec<ProcessedItem> {
        self.items.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Terminal items over all items.
    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.items.iter().filter(|i| i.status.is_terminal()).count(),
            total: self.items.len(),
        }
    }

    /// Items that made it to `Success`, in input order.
    pub fn successful(&self) -> impl Iterator<Item = &ProcessedItem> {
        self.items.iter().filter(|i| i.is_success())
    }

    pub fn summary(&self) -> BatchSummary {
        summarize(&self.items)
    }

    /// Reset every item to `Pending`, discarding outputs and errors.
    ///
    /// Probed dimensions are kept: they describe the source, not a run.
    pub fn reset(&mut self) {
        for item in &mut self.items {
            item.status = ItemStatus::Pending;
        }
    }

    /// Back-fill probed dimensions, index by index.
    ///
    /// Failed probes leave the `0x0` sentinel. Status is never touched.
    /// Returns `false` (and changes nothing) when `generation` is stale or the
    /// result count does not match the item count.
    pub fn apply_probe_results(
        &mut self,
        generation: u64,
        results: Vec<Result<Dimensions, BackendError>>,
    ) -> bool {
        if generation != self.generation || results.len() != self.items.len() {
            debug!(
                "discarding probe results for generation {} (current {})",
                generation, self.generation
            );
            return false;
        }
        for (item, result) in self.items.iter_mut().zip(results) {
            item.original_dimensions = match result {
                Ok(dims) => dims,
                Err(err) => {
                    debug!("probe failed for {}: {}", item.source_filename, err);
                    Dimensions::UNKNOWN
                }
            };
        }
        true
    }

    /// Probe every source in parallel and back-fill the results.
    pub fn probe(&mut self, backend: &(impl ImageBackend + ?Sized)) {
        let generation = self.generation;
        let results = probe_all(backend, &self.sources);
        self.apply_probe_results(generation, results);
    }
}

/// Completed items out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// `completed / total * 100`; `0` for an empty batch.
    pub fn percent(self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Progress events emitted during a run.
///
/// Sent through an optional channel so callers can display progress
/// without the processing logic knowing about output formatting.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Every item has been reset to `Pending`. `items` is the batch as the
    /// first item is about to start.
    RunStarted {
        total: usize,
        workers: usize,
        items: Vec<ProcessedItem>,
    },
    /// An item moved to `Processing`.
    ItemStarted { id: ItemId, filename: String },
    /// An item reached a terminal state.
    ItemFinished { item: ProcessedItem, progress: Progress },
    RunFinished { summary: BatchSummary, cancelled: bool },
}

fn emit(events: Option<&Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        tx.send(event).ok();
    }
}

// ============================================================================
// Run control
// ============================================================================

/// Cooperative cancellation flag, checked between items only.
///
/// An item that has started always runs to completion, so cancelling never
/// leaves a half-written output behind.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a run is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// `1` = strictly sequential.
    pub workers: usize,
    /// Per-item limit. `None` waits as long as the item takes.
    pub item_timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            item_timeout: None,
        }
    }
}

impl RunOptions {
    /// Options from the `[processing]` config section, with the worker count
    /// clamped to the available cores.
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            workers: effective_workers(config),
            item_timeout: config.item_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// What a finished run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: BatchSummary,
    pub progress: Progress,
    /// Cancelled before every item was visited.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Finished(RunReport),
    /// Another run on this processor was in progress; nothing was touched.
    AlreadyRunning,
}

/// Clears the running flag however the run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Drives batches through the pipeline, at most one run at a time.
pub struct BatchProcessor<B> {
    backend: Arc<B>,
    options: RunOptions,
    running: AtomicBool,
    cancel: CancelToken,
}

impl<B: ImageBackend + 'static> BatchProcessor<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, RunOptions::default())
    }

    pub fn with_options(backend: B, options: RunOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
            running: AtomicBool::new(false),
            cancel: CancelToken::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Token that cancels the current run. It is re-armed when a run starts.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process every item of `batch` with `settings`.
    ///
    /// Settings are validated before anything is reset. Per-item failures
    /// end up on the items, never in the returned error.
    pub fn run(
        &self,
        batch: &mut Batch,
        settings: &ToolSettings,
        events: Option<Sender<ProcessEvent>>,
    ) -> Result<RunOutcome, ConfigError> {
        settings.validate()?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("ignoring start request: a run is already in progress");
            return Ok(RunOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        self.cancel.reset();

        let events = events.as_ref();
        let total = batch.len();
        let workers = self.options.workers.max(1);

        batch.reset();
        emit(
            events,
            ProcessEvent::RunStarted {
                total,
                workers,
                items: batch.snapshot(),
            },
        );
        info!("processing {} images with {} worker(s)", total, workers);

        let completed = AtomicUsize::new(0);
        let (sources, items) = (&batch.sources, &mut batch.items);

        if workers > 1 && total > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| {
                    items
                        .par_iter_mut()
                        .zip(sources.par_iter())
                        .for_each(|(item, source)| {
                            if !self.cancel.is_cancelled() {
                                self.process_item(item, source, settings, &completed, total, events);
                            }
                        });
                }),
                Err(err) => {
                    warn!("worker pool unavailable ({}), running sequentially", err);
                    self.run_sequential(items, sources, settings, &completed, events);
                }
            }
        } else {
            self.run_sequential(items, sources, settings, &completed, events);
        }

        let progress = batch.progress();
        let cancelled = progress.completed < total;
        let summary = batch.summary();
        if cancelled {
            info!("run cancelled after {}/{} images", progress.completed, total);
        } else {
            info!(
                "run finished: {} succeeded, {} failed",
                summary.success_count, summary.failed_count
            );
        }
        emit(events, ProcessEvent::RunFinished { summary, cancelled });

        Ok(RunOutcome::Finished(RunReport {
            summary,
            progress,
            cancelled,
        }))
    }

    fn run_sequential(
        &self,
        items: &mut [ProcessedItem],
        sources: &[SourceImage],
        settings: &ToolSettings,
        completed: &AtomicUsize,
        events: Option<&Sender<ProcessEvent>>,
    ) {
        let total = items.len();
        for (item, source) in items.iter_mut().zip(sources) {
            if self.cancel.is_cancelled() {
                break;
            }
            self.process_item(item, source, settings, completed, total, events);
        }
    }

    /// One item, start to terminal state.
    fn process_item(
        &self,
        item: &mut ProcessedItem,
        source: &SourceImage,
        settings: &ToolSettings,
        completed: &AtomicUsize,
        total: usize,
        events: Option<&Sender<ProcessEvent>>,
    ) {
        item.status = ItemStatus::Processing;
        emit(
            events,
            ProcessEvent::ItemStarted {
                id: item.id,
                filename: item.source_filename.clone(),
            },
        );

        match self.run_unit(source, settings) {
            Ok(processed) => {
                debug!(
                    "{} {} -> {} ({} bytes)",
                    item.id,
                    processed.original_dimensions,
                    processed.output.dimensions,
                    processed.output.size()
                );
                item.original_dimensions = processed.original_dimensions;
                item.status = ItemStatus::Success(processed.output);
            }
            Err(err) => {
                warn!("{} {} failed: {}", item.id, item.source_filename, err);
                item.status = ItemStatus::Failed(err);
            }
        }

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        emit(
            events,
            ProcessEvent::ItemFinished {
                item: item.clone(),
                progress: Progress {
                    completed: done,
                    total,
                },
            },
        );
    }

    /// Probe → resolve → encode as a single unit, optionally time-limited.
    ///
    /// With a timeout the unit runs on its own thread. A unit that overruns
    /// is abandoned: its thread finishes in the background and the result is
    /// dropped.
    fn run_unit(
        &self,
        source: &SourceImage,
        settings: &ToolSettings,
    ) -> Result<ProcessedImage, ItemError> {
        let Some(limit) = self.options.item_timeout else {
            return process_image(&*self.backend, source, settings).map_err(ItemError::from);
        };

        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let source = source.clone();
        let settings = *settings;

        std::thread::Builder::new()
            .name("pixpress-item".to_string())
            .spawn(move || {
                tx.send(process_image(&*backend, &source, &settings)).ok();
            })
            .map_err(|e| BackendError::Resource(format!("cannot spawn worker thread: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result.map_err(ItemError::from),
            Err(RecvTimeoutError::Timeout) => Err(ItemError::Timeout(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(ItemError::Backend(BackendError::Resource(
                "worker thread exited without a result".to_string(),
            ))),
        }
    }
}
