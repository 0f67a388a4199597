//! Attribute and table discovery
//!
//! Runs once before an export starts. Records in a table need not share a
//! schema, so the attribute set is the union of names seen in a sample of
//! records. The export pipeline never calls into this module; it only sees
//! the finished [`ProjectionSpec`](crate::export::ProjectionSpec).

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::Result;
use crate::export::RowSource;

/// Default number of records sampled for attribute discovery
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// List the tables available in the store, sorted by name
pub async fn list_tables(source: &dyn RowSource) -> Result<Vec<String>> {
    let mut tables = source.list_tables().await?;
    tables.sort();
    debug!("Found {} tables", tables.len());
    Ok(tables)
}

/// Collect the attribute names present in the first records of a table
///
/// # Arguments
/// * `source` - Store to sample
/// * `table` - Table name
/// * `sample_size` - Maximum number of records to read
///
/// # Returns
/// * `Result<BTreeSet<String>>` - Union of attribute names, sorted
pub async fn discover_attributes(
    source: &dyn RowSource,
    table: &str,
    sample_size: usize,
) -> Result<BTreeSet<String>> {
    let records = source.sample(table, sample_size.max(1)).await?;

    let attributes: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.names().map(str::to_string))
        .collect();

    info!(
        "Found {} unique attributes in {} sampled records of {}",
        attributes.len(),
        records.len(),
        table
    );
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MemoryRowSource, Record};

    fn source() -> MemoryRowSource {
        MemoryRowSource::new()
            .with_table(
                "users",
                vec![
                    Record::new().with("id", "1").with("name", "Ann"),
                    Record::new().with("id", "2").with("email", "b@example.com"),
                    Record::new().with("id", "3").with("zip", "12345"),
                ],
            )
            .with_table("audit", Vec::new())
    }

    #[tokio::test]
    async fn test_discover_union_of_attributes() {
        let attributes = discover_attributes(&source(), "users", DEFAULT_SAMPLE_SIZE)
            .await
            .unwrap();
        let names: Vec<&str> = attributes.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["email", "id", "name", "zip"]);
    }

    #[tokio::test]
    async fn test_discover_respects_sample_size() {
        let attributes = discover_attributes(&source(), "users", 1).await.unwrap();
        assert_eq!(attributes.len(), 2);
        assert!(attributes.contains("name"));
        assert!(!attributes.contains("zip"));
    }

    #[tokio::test]
    async fn test_discover_empty_and_missing_tables() {
        assert!(
            discover_attributes(&source(), "audit", 10)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(discover_attributes(&source(), "nope", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_list_tables_sorted() {
        assert_eq!(list_tables(&source()).await.unwrap(), vec!["audit", "users"]);
    }
}
