//! Segmented table export to CSV
//!
//! This module exports a table by scanning disjoint segments in parallel and
//! funnelling the projected rows through a single writer:
//! - Scan workers read segments from a [`RowSource`] and project each record
//! - A bounded relay queue carries lines from every worker to the writer
//! - The writer owns the output file and is the only task touching it
//!
//! # Architecture
//!
//! 1. **RowSource**: Lists segments of a table and scans each one lazily
//! 2. **ProjectionSpec**: Turns a record into one escaped CSV line
//! 3. **Relay queue**: Bounded MPSC channel providing backpressure
//! 4. **SinkWriter**: Drains the queue into a buffered file
//!
//! The **ScanCoordinator** wires these together and owns the export lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabledump::export::{
//!     ExportOptions, ExportRequest, MemoryRowSource, ProjectionSpec, Record, ScanCoordinator,
//! };
//!
//! # async fn run() -> tabledump::Result<()> {
//! let source = MemoryRowSource::new()
//!     .with_table("people", vec![Record::new().with("id", "1").with("name", "Ann")]);
//!
//! let request = ExportRequest {
//!     output: "people.csv".into(),
//!     table: "people".to_string(),
//!     projection: ProjectionSpec::new(["id", "name"])?,
//! };
//!
//! let mut coordinator = ScanCoordinator::new(Arc::new(source), request, ExportOptions::default());
//! let report = coordinator.execute().await?;
//! println!("{} rows written", report.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod progress;
pub mod projector;
pub mod queue;
pub mod record;
pub mod sink;
pub mod source;

pub use coordinator::{ExportOptions, ExportReport, ExportRequest, ExportState, ScanCoordinator};
pub use progress::ProgressTracker;
pub use projector::{OutputLine, ProjectionSpec, escape_field};
pub use queue::{CompletionSignal, RelayReceiver, RelaySender, relay_queue};
pub use record::{AttributeValue, Record};
pub use sink::{SinkReport, SinkWriter};
pub use source::{MemoryRowSource, MongoRowSource, RowSource, Segment, SegmentScan};
