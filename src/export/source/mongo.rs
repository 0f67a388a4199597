//! MongoDB-backed row source
//!
//! A table is a collection and a record is a document. Segment `i` of `n`
//! selects the documents whose hashed `_id` falls into bucket `i` modulo `n`,
//! which partitions the collection into disjoint, roughly even slices without
//! any coordination between scans. Projection is pushed to the server with a
//! `$project` stage so only the requested attributes travel over the wire.

use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{Cursor, Database};
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::export::projector::ProjectionSpec;
use crate::export::record::Record;

use super::{RowSource, Segment, SegmentScan};

/// Default number of documents per round trip
pub const DEFAULT_BATCH_SIZE: u32 = 1000;

/// Row source reading collections of one MongoDB database
///
/// Owns its database handle; the client behind it is released by the
/// connection manager once the export has closed.
pub struct MongoRowSource {
    db: Database,
    batch_size: u32,
}

impl MongoRowSource {
    /// Create a row source over `db`
    ///
    /// # Arguments
    /// * `db` - Database holding the tables
    /// * `batch_size` - Number of documents to fetch per batch
    pub fn new(db: Database, batch_size: u32) -> Self {
        Self {
            db,
            batch_size: batch_size.max(1),
        }
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        let names = self
            .db
            .list_collection_names()
            .filter(doc! { "name": table })
            .await?;
        if names.is_empty() {
            return Err(SourceError::TableNotFound(table.to_string()).into());
        }
        Ok(())
    }
}

/// Build the aggregation pipeline scanning one segment
///
/// The single-segment case scans the whole collection without a filter.
pub fn segment_pipeline(projection: &ProjectionSpec, segment: Segment) -> Vec<Document> {
    let mut pipeline = Vec::with_capacity(2);

    if segment.total() > 1 {
        let total = segment.total() as i64;
        let index = segment.index() as i64;
        pipeline.push(doc! {
            "$match": {
                "$expr": {
                    "$eq": [
                        { "$abs": { "$mod": [
                            { "$toHashedIndexKey": "$_id" },
                            total
                        ] } },
                        index
                    ]
                }
            }
        });
    }

    pipeline.push(doc! { "$project": projection_document(projection) });
    pipeline
}

/// `$project` document for the requested attributes
///
/// `_id` is always returned by the server unless excluded explicitly.
pub fn projection_document(projection: &ProjectionSpec) -> Document {
    let mut fields = Document::new();
    for name in projection.attributes() {
        fields.insert(name.as_str(), 1);
    }
    if !fields.contains_key("_id") {
        fields.insert("_id", 0);
    }
    fields
}

#[async_trait]
impl RowSource for MongoRowSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names = self.db.list_collection_names().await?;
        names.sort();
        Ok(names)
    }

    async fn sample(&self, table: &str, limit: usize) -> Result<Vec<Record>> {
        let cursor = self
            .db
            .collection::<Document>(table)
            .find(doc! {})
            .limit(limit as i64)
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        debug!("Sampled {} documents from {}", docs.len(), table);
        Ok(docs.into_iter().map(Record::from).collect())
    }

    async fn list_segments(&self, table: &str, desired_parallelism: usize) -> Result<Vec<Segment>> {
        self.ensure_table(table).await?;

        let estimated = self
            .db
            .collection::<Document>(table)
            .estimated_document_count()
            .await?;
        if estimated == 0 {
            info!("Table {} is empty, no segments to scan", table);
            return Ok(Vec::new());
        }

        debug!(
            "Table {} holds about {} documents, splitting into {} segments",
            table, estimated, desired_parallelism
        );
        Ok(Segment::all(desired_parallelism.max(1)))
    }

    async fn scan(
        &self,
        table: &str,
        projection: &ProjectionSpec,
        segment: Segment,
    ) -> Result<Box<dyn SegmentScan>> {
        let cursor = self
            .db
            .collection::<Document>(table)
            .aggregate(segment_pipeline(projection, segment))
            .batch_size(self.batch_size)
            .await?;

        Ok(Box::new(CursorSegmentScan::new(cursor, self.batch_size, segment)))
    }
}

/// Cursor-backed scan of one segment
pub struct CursorSegmentScan {
    cursor: Option<Cursor<Document>>,
    batch_size: u32,
    total_fetched: u64,
    segment: Segment,
    closed: bool,
}

impl CursorSegmentScan {
    /// Wrap a server cursor
    ///
    /// # Arguments
    /// * `cursor` - Cursor returned by the segment aggregation
    /// * `batch_size` - Number of documents to collect per batch
    /// * `segment` - Segment being scanned, for logging
    pub fn new(cursor: Cursor<Document>, batch_size: u32, segment: Segment) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size,
            total_fetched: 0,
            segment,
            closed: false,
        }
    }
}

#[async_trait]
impl SegmentScan for CursorSegmentScan {
    async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        if self.closed {
            return Ok(None);
        }

        let cursor = match self.cursor.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };

        let mut batch = Vec::with_capacity(self.batch_size as usize);

        for _ in 0..self.batch_size {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(Record::from(doc)),
                Ok(None) => break,
                Err(e) => {
                    // On error, close cursor to release resources
                    self.cursor = None;
                    self.closed = true;
                    return Err(e.into());
                }
            }
        }

        if batch.is_empty() {
            debug!(
                "Segment {} exhausted after {} documents",
                self.segment, self.total_fetched
            );
            self.cursor = None;
            self.closed = true;
            Ok(None)
        } else {
            self.total_fetched += batch.len() as u64;
            Ok(Some(batch))
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            // Dropping the cursor kills it on the server
            self.cursor = None;
            self.closed = true;
            debug!(
                "Closed segment {} after fetching {} documents",
                self.segment, self.total_fetched
            );
        }
        Ok(())
    }
}

impl Drop for CursorSegmentScan {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Segment scan {} dropped without explicit close", self.segment);
            self.cursor = None;
        }
    }
}
