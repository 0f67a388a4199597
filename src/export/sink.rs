//! Sink writer: the single consumer of the relay queue
//!
//! The writer owns the output file exclusively. It drains the relay queue and
//! appends every line to a buffered file, then flushes once at the end.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::config::OpenMode;
use crate::error::{ConfigError, Result, SinkError};

use super::progress::ProgressTracker;
use super::projector::OutputLine;
use super::queue::{CompletionSignal, Dequeued, RelayReceiver};

/// Default size of the output buffer
pub const DEFAULT_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Totals reported by the writer once it has closed the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Lines written, header included
    pub lines_written: u64,
    /// Bytes written by this export
    pub bytes_written: u64,
    /// Largest relay queue size observed while draining
    pub queue_high_water: usize,
}

/// Buffered writer owning the destination file
pub struct SinkWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Whether the file already had content when opened
    had_content: bool,
    /// Lines written so far, header included
    lines_written: u64,
    /// Bytes written so far
    bytes_written: u64,
}

impl SinkWriter {
    /// Open the destination file
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `mode` - Truncate (fresh export) or append
    /// * `buffer_bytes` - Size of the write buffer
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn open(path: &Path, mode: OpenMode, buffer_bytes: usize) -> Result<Self> {
        validate_path(path)?;

        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Truncate => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
        };

        let file = options.open(path).await.map_err(|e| SinkError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let had_content = match mode {
            OpenMode::Truncate => false,
            OpenMode::Append => {
                let metadata = file.metadata().await.map_err(|e| SinkError::Open {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                metadata.len() > 0
            }
        };

        debug!("Opened {} ({:?}, existing content: {})", path.display(), mode, had_content);

        Ok(Self {
            writer: BufWriter::with_capacity(buffer_bytes.max(1), file),
            path: path.to_path_buf(),
            had_content,
            lines_written: 0,
            bytes_written: 0,
        })
    }

    /// Whether the header belongs at the top of this file
    ///
    /// Always true for a truncated file. An append to a non-empty file skips
    /// it so repeated runs do not interleave header rows with data.
    pub fn needs_header(&self) -> bool {
        !self.had_content
    }

    /// Drain the relay queue until completion, then flush and close
    ///
    /// Each poll waits up to `poll_interval` for a line. When a poll times
    /// out the loop exits only if the completion signal is set and the queue
    /// is observed empty. A disconnect means every producer handle is gone
    /// and the buffer is already drained, so the loop exits as well.
    ///
    /// # Arguments
    /// * `rx` - The single consumer handle of the relay queue
    /// * `done` - Completion signal set by the coordinator
    /// * `poll_interval` - Dequeue timeout between completion checks
    /// * `progress` - Progress tracker updated per line
    ///
    /// # Returns
    /// * `Result<SinkReport>` - Totals, or the first I/O error
    pub async fn run(
        mut self,
        mut rx: RelayReceiver,
        done: CompletionSignal,
        poll_interval: Duration,
        progress: ProgressTracker,
    ) -> Result<SinkReport> {
        info!("Writer started for {}", self.path.display());

        loop {
            match rx.dequeue(poll_interval).await {
                Dequeued::Line(line) => {
                    // An error here drops `rx`, failing every pending enqueue
                    self.append(&line).await?;
                    progress.increment(1);
                }
                Dequeued::TimedOut => {
                    if done.is_set() && rx.is_empty() {
                        debug!("Completion observed with an empty queue");
                        break;
                    }
                }
                Dequeued::Disconnected => {
                    debug!(
                        "All producers dropped, queue drained (completion set: {})",
                        done.is_set()
                    );
                    break;
                }
            }
        }

        // Drop the receiver before flushing so no producer can wait on it
        let queue_high_water = rx.high_water_mark();
        drop(rx);
        let mut report = self.finalize().await?;
        report.queue_high_water = queue_high_water;
        Ok(report)
    }

    async fn append(&mut self, line: &OutputLine) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SinkError::Write {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        self.lines_written += 1;
        self.bytes_written += line.len() as u64;
        Ok(())
    }

    /// Flush buffered output and close the file
    pub async fn finalize(mut self) -> Result<SinkReport> {
        let flush_err = |e: std::io::Error| SinkError::Flush {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };
        self.writer.flush().await.map_err(flush_err)?;
        self.writer.get_mut().sync_all().await.map_err(flush_err)?;

        info!(
            "Finalized {}: {} lines, {} bytes",
            self.path.display(),
            self.lines_written,
            self.bytes_written
        );

        Ok(SinkReport {
            lines_written: self.lines_written,
            bytes_written: self.bytes_written,
            queue_high_water: 0,
        })
    }
}

/// Check that the parent directory of `path` exists
///
/// Runs before the pipeline starts so an unusable output path is reported as
/// a configuration error without launching any worker.
pub fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Generic("Output path is empty".to_string()).into());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::Generic(format!(
                "Directory does not exist: {}",
                parent.display()
            ))
            .into());
        }
    }

    if path.is_dir() {
        return Err(ConfigError::Generic(format!(
            "Output path is a directory: {}",
            path.display()
        ))
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::projector::ProjectionSpec;
    use crate::export::queue::relay_queue;
    use crate::export::record::Record;
    use tokio::fs;

    fn id_line(id: usize) -> OutputLine {
        let spec = ProjectionSpec::new(["id"]).unwrap();
        spec.project(&Record::new().with("id", id.to_string()))
    }

    #[tokio::test]
    async fn test_writer_drains_after_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let sink = SinkWriter::open(&path, OpenMode::Truncate, DEFAULT_BUFFER_BYTES)
            .await
            .unwrap();
        let (tx, rx) = relay_queue(8);
        let done = CompletionSignal::new();

        for i in 0..5 {
            tx.enqueue(id_line(i)).await.unwrap();
        }
        // Signal before the writer has seen anything: every line must still land
        done.set();

        let report = sink
            .run(rx, done, Duration::from_millis(5), ProgressTracker::disabled())
            .await
            .unwrap();
        drop(tx);

        assert_eq!(report.lines_written, 5);
        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "0\n1\n2\n3\n4\n");
    }

    #[tokio::test]
    async fn test_writer_keeps_polling_until_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let sink = SinkWriter::open(&path, OpenMode::Truncate, 64).await.unwrap();
        let (tx, rx) = relay_queue(2);
        let done = CompletionSignal::new();

        let writer = tokio::spawn(sink.run(
            rx,
            done.clone(),
            Duration::from_millis(2),
            ProgressTracker::disabled(),
        ));

        // Several poll intervals pass with an empty queue and no signal
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        tx.enqueue(id_line(7)).await.unwrap();
        done.set();

        let report = writer.await.unwrap().unwrap();
        assert_eq!(report.lines_written, 1);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "7\n");
    }

    #[tokio::test]
    async fn test_append_mode_skips_header_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "id\n1\n").await.unwrap();

        let sink = SinkWriter::open(&path, OpenMode::Append, 16).await.unwrap();
        assert!(!sink.needs_header());

        let fresh = dir.path().join("fresh.csv");
        let sink_fresh = SinkWriter::open(&fresh, OpenMode::Append, 16).await.unwrap();
        assert!(sink_fresh.needs_header());

        let truncated = SinkWriter::open(&path, OpenMode::Truncate, 16).await.unwrap();
        assert!(truncated.needs_header());
        drop(sink);
        drop(truncated);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_fails() {
        let result = SinkWriter::open(
            Path::new("/nonexistent/directory/out.csv"),
            OpenMode::Truncate,
            16,
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::error::TableDumpError::Config(_))
        ));
    }

    #[test]
    fn test_validate_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_path(dir.path()).is_err());
        assert!(validate_path(&dir.path().join("ok.csv")).is_ok());
        assert!(validate_path(Path::new("")).is_err());
    }
}
