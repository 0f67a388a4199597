//! Error handling for table exports.
//!
//! Errors are grouped by where they originate in the pipeline:
//! - Source errors from the row source boundary (scan, listing, sampling)
//! - Sink errors from the single writer that owns the output file
//! - Configuration errors, caught before any worker is launched
//! - Connection errors while establishing the store client
//!
//! # Example
//!
//! ```rust,no_run
//! use tabledump::error::{Result, SourceError, TableDumpError};
//!
//! fn scan_segment() -> Result<()> {
//!     Err(SourceError::Unavailable("throttled".to_string()).into())
//! }
//!
//! match scan_segment() {
//!     Err(TableDumpError::Source(e)) => eprintln!("source failed: {e}"),
//!     _ => {}
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, ConnectionError, Result, SinkError, SourceError, TableDumpError};
