use std::{fmt, io};

/// Crate-wide `Result` type using [`TableDumpError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, TableDumpError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum TableDumpError {
    /// Row source errors (scan, listing, sampling).
    Source(SourceError),

    /// Output file errors raised by the sink writer.
    Sink(SinkError),

    /// Configuration errors.
    Config(ConfigError),

    /// Connection-related errors.
    Connection(ConnectionError),

    /// I/O errors outside of the sink (terminal input, config files).
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Errors raised at the row source boundary.
///
/// Every transport, throttling or protocol failure from the store ends up as
/// [`SourceError::Unavailable`]; there is no retry inside the pipeline.
#[derive(Debug)]
pub enum SourceError {
    /// The store could not serve the request.
    Unavailable(String),

    /// Segment descriptor outside of its partition count.
    InvalidSegment { index: usize, total: usize },

    /// Table does not exist in the store.
    TableNotFound(String),
}

/// Errors raised by the sink writer.
#[derive(Debug)]
pub enum SinkError {
    /// Failed to open the destination file.
    Open { path: String, message: String },

    /// Failed to append to the destination file.
    Write { path: String, message: String },

    /// Failed to flush buffered output.
    Flush { path: String, message: String },

    /// The writer stopped consuming; no more lines can be enqueued.
    Closed,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// No attributes selected for export.
    EmptyProjection,

    /// Generic configuration error.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for TableDumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableDumpError::Source(e) => write!(f, "Source error: {e}"),
            TableDumpError::Sink(e) => write!(f, "Sink error: {e}"),
            TableDumpError::Config(e) => write!(f, "Configuration error: {e}"),
            TableDumpError::Connection(e) => write!(f, "Connection error: {e}"),
            TableDumpError::Io(e) => write!(f, "I/O error: {e}"),
            TableDumpError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "Source unavailable: {msg}"),
            SourceError::InvalidSegment { index, total } => {
                write!(f, "Invalid segment {index} of {total}")
            }
            SourceError::TableNotFound(name) => write!(f, "Table not found: {name}"),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Open { path, message } => write!(f, "Failed to open {path}: {message}"),
            SinkError::Write { path, message } => {
                write!(f, "Failed to write to {path}: {message}")
            }
            SinkError::Flush { path, message } => write!(f, "Failed to flush {path}: {message}"),
            SinkError::Closed => write!(f, "Writer is no longer accepting lines"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::EmptyProjection => write!(f, "No attributes selected for export"),
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl std::error::Error for TableDumpError {}
impl std::error::Error for SourceError {}
impl std::error::Error for SinkError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ConnectionError {}

impl TableDumpError {
    /// Whether this error was caused by the writer going away.
    ///
    /// Producers fail with this once the sink aborts, so the coordinator
    /// prefers the sink's own error when reporting.
    pub fn is_sink_closed(&self) -> bool {
        matches!(self, TableDumpError::Sink(SinkError::Closed))
    }
}

/* ========================= Conversions to TableDumpError ========================= */

impl From<io::Error> for TableDumpError {
    fn from(err: io::Error) -> Self {
        TableDumpError::Io(err)
    }
}

impl From<mongodb::error::Error> for TableDumpError {
    fn from(err: mongodb::error::Error) -> Self {
        TableDumpError::Source(SourceError::Unavailable(err.to_string()))
    }
}

impl From<SourceError> for TableDumpError {
    fn from(err: SourceError) -> Self {
        TableDumpError::Source(err)
    }
}

impl From<SinkError> for TableDumpError {
    fn from(err: SinkError) -> Self {
        TableDumpError::Sink(err)
    }
}

impl From<ConfigError> for TableDumpError {
    fn from(err: ConfigError) -> Self {
        TableDumpError::Config(err)
    }
}

impl From<ConnectionError> for TableDumpError {
    fn from(err: ConnectionError) -> Self {
        TableDumpError::Connection(err)
    }
}

impl From<String> for TableDumpError {
    fn from(msg: String) -> Self {
        TableDumpError::Generic(msg)
    }
}

impl From<&str> for TableDumpError {
    fn from(msg: &str) -> Self {
        TableDumpError::Generic(msg.to_owned())
    }
}

impl From<toml::de::Error> for TableDumpError {
    fn from(err: toml::de::Error) -> Self {
        TableDumpError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err: TableDumpError = SourceError::Unavailable("throttled".to_string()).into();
        assert_eq!(err.to_string(), "Source error: Source unavailable: throttled");
    }

    #[test]
    fn test_sink_closed_detection() {
        let err: TableDumpError = SinkError::Closed.into();
        assert!(err.is_sink_closed());

        let other: TableDumpError = SinkError::Write {
            path: "out.csv".to_string(),
            message: "disk full".to_string(),
        }
        .into();
        assert!(!other.is_sink_closed());
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "export.queue_capacity".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value '0' for field 'export.queue_capacity'"
        );
    }
}
