//! In-memory row source
//!
//! Holds tables as plain vectors of records. Segment `i` of `n` yields the
//! records whose position modulo `n` equals `i`. A segment can be configured
//! to fail part-way through, which exercises the pipeline's failure paths.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Result, SourceError};
use crate::export::projector::ProjectionSpec;
use crate::export::record::Record;

use super::{RowSource, Segment, SegmentScan};

/// Row source over in-memory tables
#[derive(Debug, Clone)]
pub struct MemoryRowSource {
    tables: BTreeMap<String, Vec<Record>>,
    batch_size: usize,
    failure: Option<InjectedFailure>,
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    segment: usize,
    after_records: usize,
}

impl MemoryRowSource {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            batch_size: 16,
            failure: None,
        }
    }

    /// Add or replace a table
    pub fn with_table(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.tables.insert(name.into(), records);
        self
    }

    /// Records per batch handed to the scanner
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Make segment `segment` fail once it has produced `after_records` records
    pub fn failing_segment(mut self, segment: usize, after_records: usize) -> Self {
        self.failure = Some(InjectedFailure {
            segment,
            after_records,
        });
        self
    }

    fn table(&self, name: &str) -> Result<&Vec<Record>> {
        self.tables
            .get(name)
            .ok_or_else(|| SourceError::TableNotFound(name.to_string()).into())
    }
}

impl Default for MemoryRowSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn sample(&self, table: &str, limit: usize) -> Result<Vec<Record>> {
        Ok(self.table(table)?.iter().take(limit).cloned().collect())
    }

    async fn list_segments(&self, table: &str, desired_parallelism: usize) -> Result<Vec<Segment>> {
        if self.table(table)?.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Segment::all(desired_parallelism.max(1)))
    }

    async fn scan(
        &self,
        table: &str,
        projection: &ProjectionSpec,
        segment: Segment,
    ) -> Result<Box<dyn SegmentScan>> {
        // Mirror request-level projection: drop attributes nobody asked for
        let records = self
            .table(table)?
            .iter()
            .skip(segment.index())
            .step_by(segment.total())
            .map(|record| {
                let mut projected = Record::new();
                for name in projection.attributes() {
                    if let Some(value) = record.get(name) {
                        projected.insert(name.clone(), value.clone());
                    }
                }
                projected
            })
            .collect::<Vec<_>>();

        let fail_after = self
            .failure
            .filter(|f| f.segment == segment.index())
            .map(|f| f.after_records);

        Ok(Box::new(MemorySegmentScan {
            records: records.into_iter(),
            batch_size: self.batch_size,
            produced: 0,
            fail_after,
            segment,
            exhausted: false,
        }))
    }
}

struct MemorySegmentScan {
    records: std::vec::IntoIter<Record>,
    batch_size: usize,
    produced: usize,
    fail_after: Option<usize>,
    segment: Segment,
    exhausted: bool,
}

#[async_trait]
impl SegmentScan for MemorySegmentScan {
    async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        if self.exhausted {
            return Ok(None);
        }

        if let Some(limit) = self.fail_after {
            if self.produced >= limit {
                self.exhausted = true;
                return Err(SourceError::Unavailable(format!(
                    "injected failure in segment {}",
                    self.segment
                ))
                .into());
            }
        }

        let mut take = self.batch_size;
        if let Some(limit) = self.fail_after {
            take = take.min(limit - self.produced);
        }

        let batch: Vec<Record> = self.records.by_ref().take(take).collect();
        if batch.is_empty() && self.fail_after.is_none() {
            self.exhausted = true;
            return Ok(None);
        }

        self.produced += batch.len();
        if batch.is_empty() {
            // Ran dry before the injected failure point: fail now
            self.exhausted = true;
            return Err(SourceError::Unavailable(format!(
                "injected failure in segment {}",
                self.segment
            ))
            .into());
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        self.exhausted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new().with("id", i.to_string()).with("secret", "x"))
            .collect()
    }

    async fn drain(scan: &mut Box<dyn SegmentScan>) -> Result<Vec<Record>> {
        let mut all = Vec::new();
        while let Some(batch) = scan.next_batch().await? {
            all.extend(batch);
        }
        Ok(all)
    }

    #[tokio::test]
    async fn test_segments_are_disjoint_and_complete() {
        let source = MemoryRowSource::new().with_table("people", people(10)).with_batch_size(3);
        let spec = ProjectionSpec::new(["id"]).unwrap();

        let segments = source.list_segments("people", 4).await.unwrap();
        assert_eq!(segments.len(), 4);

        let mut ids = Vec::new();
        for segment in segments {
            let mut scan = source.scan("people", &spec, segment).await.unwrap();
            for record in drain(&mut scan).await.unwrap() {
                assert!(record.get("secret").is_none(), "projection not applied");
                ids.push(record.get_str("id").unwrap().parse::<usize>().unwrap());
            }
        }
        ids.sort();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_table_has_no_segments() {
        let source = MemoryRowSource::new().with_table("empty", Vec::new());
        assert!(source.list_segments("empty", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let source = MemoryRowSource::new();
        assert!(source.list_segments("missing", 2).await.is_err());
        assert!(source.list_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_is_not_restartable() {
        let source = MemoryRowSource::new().with_table("t", people(2));
        let spec = ProjectionSpec::new(["id"]).unwrap();
        let mut scan = source.scan("t", &spec, Segment::new(0, 1).unwrap()).await.unwrap();

        assert_eq!(drain(&mut scan).await.unwrap().len(), 2);
        assert!(scan.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let source = MemoryRowSource::new()
            .with_table("t", people(10))
            .with_batch_size(2)
            .failing_segment(0, 3);
        let spec = ProjectionSpec::new(["id"]).unwrap();
        let mut scan = source.scan("t", &spec, Segment::new(0, 1).unwrap()).await.unwrap();

        assert_eq!(scan.next_batch().await.unwrap().unwrap().len(), 2);
        assert_eq!(scan.next_batch().await.unwrap().unwrap().len(), 1);
        assert!(scan.next_batch().await.is_err());
        assert!(scan.next_batch().await.unwrap().is_none());
    }
}
