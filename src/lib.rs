//! Parallel table export library
//!
//! This library provides the core functionality of `tabledump`: exporting the
//! full contents of a large table to CSV by scanning disjoint segments in
//! parallel and funnelling every row through a single buffered writer.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and interactive setup
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `discovery`: Table listing and attribute discovery
//! - `error`: Error types and handling
//! - `export`: Segmented scan pipeline (row sources, projector, queue, writer)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabledump::{config::Config, connection::ConnectionManager};
//! use tabledump::export::{ExportOptions, ExportRequest, MongoRowSource, ProjectionSpec, ScanCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut manager = ConnectionManager::new(config.connection.clone());
//!     manager.connect().await?;
//!
//!     let source = MongoRowSource::new(manager.database()?, config.export.scan_batch_size);
//!     let request = ExportRequest {
//!         output: "users.csv".into(),
//!         table: "users".to_string(),
//!         projection: ProjectionSpec::new(["id", "email"])?,
//!     };
//!
//!     let report = ScanCoordinator::new(Arc::new(source), request, ExportOptions::from(&config.export))
//!         .execute()
//!         .await?;
//!     println!("{} rows exported", report.rows_written);
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod export;

// Re-export commonly used types
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{Result, TableDumpError};
pub use export::{ExportOptions, ExportReport, ExportRequest, ScanCoordinator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
