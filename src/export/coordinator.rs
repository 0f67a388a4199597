//! Scan coordinator for orchestrating segmented exports
//!
//! The coordinator drives one export through
//! `Initializing → Scanning → Draining → Closed`:
//!
//! 1. Initializing: list segments, open the sink, enqueue the header
//! 2. Scanning: a bounded pool of workers pulls segments from a shared pool,
//!    projects every record and enqueues the lines
//! 3. Draining: once every worker has been joined, set the completion signal
//!    and wait for the writer
//! 4. Closed: the file is flushed and closed, the outcome is reported
//!
//! A failing worker never skips the drain: the coordinator always reaches
//! `Closed` before surfacing the error.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ExportConfig, OpenMode};
use crate::error::{ConfigError, Result, TableDumpError};

use super::progress::ProgressTracker;
use super::projector::ProjectionSpec;
use super::queue::{CompletionSignal, RelaySender, relay_queue};
use super::sink::{SinkWriter, validate_path};
use super::source::{RowSource, Segment, SegmentScan};

/// What to export and where
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Destination CSV file
    pub output: PathBuf,
    /// Table to scan
    pub table: String,
    /// Attributes to read, in output order
    pub projection: ProjectionSpec,
}

/// Tuning knobs for one export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Capacity of the relay queue
    pub queue_capacity: usize,
    /// Writer dequeue timeout between completion checks
    pub poll_interval: Duration,
    /// Number of segments requested from the row source
    pub segments: usize,
    /// Upper bound on concurrently running scans
    pub max_parallel_scans: usize,
    /// How the output file is opened
    pub open_mode: OpenMode,
    /// Output buffer size in bytes
    pub write_buffer_bytes: usize,
    /// Display a progress spinner
    pub show_progress: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            poll_interval: config.poll_interval(),
            segments: config.segment_count(),
            max_parallel_scans: config.parallelism(),
            open_mode: config.open_mode,
            write_buffer_bytes: config.write_buffer_bytes,
            show_progress: false,
        }
    }
}

impl ExportOptions {
    /// Reject options that would stall the pipeline
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("queue_capacity", self.queue_capacity),
            ("segments", self.segments),
            ("max_parallel_scans", self.max_parallel_scans),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval".to_string(),
                value: "0ms".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Result of an export operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Data rows written, header excluded
    pub rows_written: u64,
    /// Segments scanned to completion
    pub segments_scanned: usize,
    /// Bytes appended to the file by this export
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Largest relay queue size observed
    pub queue_high_water: usize,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// Lifecycle of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Initializing,
    Scanning,
    Draining,
    Closed,
}

/// Coordinator for segmented export operations
///
/// Owns the row source handle for the duration of the export and fans the
/// scan out over a bounded worker pool feeding a single writer.
pub struct ScanCoordinator {
    /// Row source shared by every worker
    source: Arc<dyn RowSource>,
    /// What to export
    request: ExportRequest,
    /// Pipeline tuning
    options: ExportOptions,
    /// Cancellation token for aborting export
    cancel_token: CancellationToken,
    /// Current lifecycle state
    state: ExportState,
}

/// Everything a scan worker needs, owned so the task is `'static`
struct WorkerContext {
    source: Arc<dyn RowSource>,
    table: Arc<str>,
    projection: ProjectionSpec,
    pool: Arc<Mutex<VecDeque<Segment>>>,
    tx: RelaySender,
    stop: CancellationToken,
}

#[derive(Debug, Default)]
struct WorkerSummary {
    segments: usize,
    rows: u64,
}

impl ScanCoordinator {
    /// Create a new scan coordinator
    pub fn new(source: Arc<dyn RowSource>, request: ExportRequest, options: ExportOptions) -> Self {
        Self {
            source,
            request,
            options,
            cancel_token: CancellationToken::new(),
            state: ExportState::Initializing,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExportState {
        self.state
    }

    fn transition(&mut self, next: ExportState) {
        debug!("Export state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Execute the export operation
    ///
    /// Configuration and segment listing errors are returned before any
    /// worker starts. Once scanning has begun, every path goes through
    /// draining and closing before the outcome is returned; partial output
    /// stays on disk.
    ///
    /// # Returns
    /// * `Result<ExportReport>` - Export statistics or the first fatal error
    pub async fn execute(&mut self) -> Result<ExportReport> {
        let start_time = Instant::now();
        self.transition(ExportState::Initializing);

        self.options.validate()?;
        validate_path(&self.request.output)?;

        info!(
            "Starting export of {} ({} attributes) to {}",
            self.request.table,
            self.request.projection.len(),
            self.request.output.display()
        );

        let segments = self
            .source
            .list_segments(&self.request.table, self.options.segments)
            .await?;

        let sink = SinkWriter::open(
            &self.request.output,
            self.options.open_mode,
            self.options.write_buffer_bytes,
        )
        .await?;

        let (tx, rx) = relay_queue(self.options.queue_capacity);
        let done = CompletionSignal::new();
        let progress = ProgressTracker::new(self.options.show_progress);

        let header_enqueued = sink.needs_header();
        if header_enqueued {
            // Capacity is at least one and nothing else holds a sender yet
            tx.enqueue(self.request.projection.header_line()).await?;
        }

        let writer = tokio::spawn(sink.run(
            rx,
            done.clone(),
            self.options.poll_interval,
            progress.clone(),
        ));

        self.transition(ExportState::Scanning);

        let workers = segments.len().min(self.options.max_parallel_scans);
        info!(
            "Scanning {} segments with {} workers (queue capacity {})",
            segments.len(),
            workers,
            self.options.queue_capacity
        );

        let pool = Arc::new(Mutex::new(VecDeque::from(segments)));
        let table: Arc<str> = Arc::from(self.request.table.as_str());
        let stop = self.cancel_token.child_token();

        let mut join_set = JoinSet::new();
        for worker_id in 0..workers {
            let ctx = WorkerContext {
                source: self.source.clone(),
                table: table.clone(),
                projection: self.request.projection.clone(),
                pool: pool.clone(),
                tx: tx.clone(),
                stop: stop.clone(),
            };
            join_set.spawn(run_worker(worker_id, ctx));
        }
        drop(tx);

        let mut first_error: Option<TableDumpError> = None;
        let mut segments_scanned = 0usize;
        let mut rows_enqueued = 0u64;

        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => Err(TableDumpError::Generic(format!(
                    "Scan worker panicked: {join_error}"
                ))),
            };

            match outcome {
                Ok(summary) => {
                    segments_scanned += summary.segments;
                    rows_enqueued += summary.rows;
                }
                Err(e) => {
                    if !stop.is_cancelled() {
                        error!("Scan worker failed, stopping remaining workers: {}", e);
                        stop.cancel();
                    }
                    keep_root_cause(&mut first_error, e);
                }
            }
        }

        self.transition(ExportState::Draining);
        done.set();

        let sink_outcome = match writer.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(TableDumpError::Generic(format!(
                "Writer task panicked: {join_error}"
            ))),
        };
        progress.finish();

        self.transition(ExportState::Closed);

        // The writer's own error explains any producer that saw it go away
        let sink_report = sink_outcome?;
        if let Some(e) = first_error {
            return Err(e);
        }

        let rows_written = sink_report.lines_written - u64::from(header_enqueued);
        if rows_written != rows_enqueued {
            warn!(
                "Row count mismatch: {} enqueued, {} written",
                rows_enqueued, rows_written
            );
        }

        let cancelled = self.cancel_token.is_cancelled();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        if cancelled {
            info!("Export cancelled after {} rows", rows_written);
        } else {
            info!(
                "Export completed: {} rows, {} segments, {} bytes, {} ms",
                rows_written, segments_scanned, sink_report.bytes_written, elapsed_ms
            );
        }

        Ok(ExportReport {
            rows_written,
            segments_scanned,
            bytes_written: sink_report.bytes_written,
            elapsed_ms,
            queue_high_water: sink_report.queue_high_water,
            cancelled,
        })
    }
}

/// Record `e` unless a more telling error is already held
///
/// Producers that failed only because the writer went away are replaced by
/// any real source error.
fn keep_root_cause(slot: &mut Option<TableDumpError>, e: TableDumpError) {
    match slot {
        None => *slot = Some(e),
        Some(held) if held.is_sink_closed() && !e.is_sink_closed() => *slot = Some(e),
        Some(_) => {}
    }
}

/// Pull segments from the shared pool until it is empty or the export stops
async fn run_worker(worker_id: usize, ctx: WorkerContext) -> Result<WorkerSummary> {
    let mut summary = WorkerSummary::default();

    loop {
        if ctx.stop.is_cancelled() {
            debug!("Worker {} stopping early", worker_id);
            break;
        }

        let next = {
            let mut pool = ctx
                .pool
                .lock()
                .map_err(|_| TableDumpError::Generic("Segment pool poisoned".to_string()))?;
            pool.pop_front()
        };
        let Some(segment) = next else {
            break;
        };

        debug!("Worker {} scanning segment {}", worker_id, segment);
        let (rows, completed) = scan_segment(&ctx, segment).await?;
        summary.rows += rows;
        if completed {
            summary.segments += 1;
            debug!("Segment {} done: {} rows", segment, rows);
        }
    }

    Ok(summary)
}

/// Scan one segment and always close it, whatever the outcome
async fn scan_segment(ctx: &WorkerContext, segment: Segment) -> Result<(u64, bool)> {
    let mut scan = ctx
        .source
        .scan(&ctx.table, &ctx.projection, segment)
        .await?;

    let streamed = stream_segment(ctx, scan.as_mut()).await;
    let closed = scan.close().await;

    let outcome = streamed?;
    closed?;
    Ok(outcome)
}

/// Project and enqueue every record of a scan
///
/// # Returns
/// * `Result<(u64, bool)>` - Rows enqueued, and whether the scan ran to the end
async fn stream_segment(ctx: &WorkerContext, scan: &mut dyn SegmentScan) -> Result<(u64, bool)> {
    let mut rows = 0u64;

    while let Some(batch) = scan.next_batch().await? {
        for record in &batch {
            let line = ctx.projection.project(record);
            tokio::select! {
                biased;
                _ = ctx.stop.cancelled() => return Ok((rows, false)),
                sent = ctx.tx.enqueue(line) => sent?,
            }
            rows += 1;
        }
    }

    Ok((rows, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = ExportConfig::default();
        config.queue_capacity = 2;
        config.segments = Some(5);
        config.max_parallel_scans = Some(3);

        let options = ExportOptions::from(&config);
        assert_eq!(options.queue_capacity, 2);
        assert_eq!(options.segments, 5);
        assert_eq!(options.max_parallel_scans, 3);
        assert!(!options.show_progress);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_reject_zero_values() {
        let options = ExportOptions {
            max_parallel_scans: 0,
            ..ExportOptions::default()
        };
        assert!(options.validate().is_err());

        let options = ExportOptions {
            poll_interval: Duration::ZERO,
            ..ExportOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_keep_root_cause_prefers_source_errors() {
        use crate::error::{SinkError, SourceError};

        let mut slot = None;
        keep_root_cause(&mut slot, SinkError::Closed.into());
        keep_root_cause(&mut slot, SourceError::Unavailable("boom".to_string()).into());
        keep_root_cause(&mut slot, SinkError::Closed.into());

        assert!(matches!(slot, Some(TableDumpError::Source(_))));
    }
}
