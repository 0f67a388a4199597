//! Row source abstractions for segmented scans
//!
//! A row source wraps a store that can split a table into disjoint segments
//! and scan each segment independently. Scans are lazy: records arrive in
//! batches, and a segment's sequence is finite and cannot be restarted.

use async_trait::async_trait;

use crate::error::{Result, SourceError};

use super::projector::ProjectionSpec;
use super::record::Record;

pub mod memory;
pub mod mongo;

pub use memory::MemoryRowSource;
pub use mongo::MongoRowSource;

/// One disjoint partition of a table's keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    index: usize,
    total: usize,
}

impl Segment {
    /// Create a segment descriptor
    ///
    /// # Errors
    /// Returns [`SourceError::InvalidSegment`] unless `index < total`.
    pub fn new(index: usize, total: usize) -> Result<Self> {
        if index >= total {
            return Err(SourceError::InvalidSegment { index, total }.into());
        }
        Ok(Self { index, total })
    }

    /// All `total` segments of a table
    pub fn all(total: usize) -> Vec<Segment> {
        (0..total).map(|index| Segment { index, total }).collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}

/// Trait for streaming one segment's records in batches
#[async_trait]
pub trait SegmentScan: Send {
    /// Fetch the next batch of records
    ///
    /// # Returns
    /// * `Result<Option<Vec<Record>>>` - Next batch, or None once exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Record>>>;

    /// Close the scan and release store resources
    async fn close(&mut self) -> Result<()>;
}

/// A store that can be scanned in parallel segments
///
/// Shared by every scan worker, so implementations must be `Send + Sync`.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Names of the tables available in the store
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Up to `limit` records from the start of a table
    async fn sample(&self, table: &str, limit: usize) -> Result<Vec<Record>>;

    /// Partition a table into segments
    ///
    /// Returns `desired_parallelism` segments, or none when the table holds
    /// no records.
    async fn list_segments(&self, table: &str, desired_parallelism: usize) -> Result<Vec<Segment>>;

    /// Start scanning one segment, reading only the projected attributes
    async fn scan(
        &self,
        table: &str,
        projection: &ProjectionSpec,
        segment: Segment,
    ) -> Result<Box<dyn SegmentScan>>;
}
