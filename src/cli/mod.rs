//! Command-line interface for tabledump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Mode selection (non-interactive export vs interactive setup)
//! - Offline subcommands (version, completion, config)

pub mod completion;
pub mod interactive;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LogLevel, OpenMode};
use crate::error::Result;
use crate::export::ExportReport;

/// Export a table to CSV using parallel segmented scans
#[derive(Parser, Debug)]
#[command(
    name = "tabledump",
    version,
    about = "Parallel table export to CSV",
    long_about = "Exports every record of a table to a CSV file by scanning disjoint segments
in parallel and funnelling the rows through a single buffered writer.

Run with OUTPUT, TABLE and at least one ATTRIBUTE for a non-interactive export,
or with fewer arguments to choose them interactively."
)]
pub struct CliArgs {
    /// Output CSV file
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Table to export
    #[arg(value_name = "TABLE")]
    pub table: Option<String>,

    /// Attributes to export, in column order
    #[arg(value_name = "ATTRIBUTES")]
    pub attributes: Vec<String>,

    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Database holding the table
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Number of scan segments
    #[arg(long, value_name = "N")]
    pub segments: Option<usize>,

    /// Maximum number of concurrent scans
    #[arg(long = "max-parallel", value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Capacity of the queue between scanners and the writer
    #[arg(long, value_name = "LINES")]
    pub queue_capacity: Option<usize>,

    /// Append to the output file instead of truncating it
    #[arg(long)]
    pub append: bool,

    /// Disable the progress spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for tabledump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// List the tables in the configured database
    Tables,
}

/// Fully specified export taken from the command line or the interactive setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub output: PathBuf,
    pub table: String,
    pub attributes: Vec<String>,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// The merged result is validated so a bad value is reported before any
    /// connection is made.
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// The export described by the positional arguments, if complete
    ///
    /// Fewer than three positionals means the rest is chosen interactively.
    pub fn export_target(&self) -> Option<ExportTarget> {
        match (&self.args.output, &self.args.table) {
            (Some(output), Some(table)) if !self.args.attributes.is_empty() => {
                Some(ExportTarget {
                    output: output.clone(),
                    table: table.clone(),
                    attributes: self.args.attributes.clone(),
                })
            }
            _ => None,
        }
    }

    /// Whether the `tables` subcommand was requested
    pub fn wants_table_listing(&self) -> bool {
        matches!(self.args.command, Some(Commands::Tables))
    }

    /// Whether to display the progress spinner
    pub fn show_progress(&self) -> bool {
        !self.args.no_progress && !self.args.quiet
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_connection_args(config, args);
        Self::apply_export_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.uri = uri.clone();
        }
        if let Some(database) = &args.database {
            config.connection.database = database.clone();
        }
        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }
    }

    /// Apply export pipeline CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        if let Some(segments) = args.segments {
            config.export.segments = Some(segments);
        }
        if let Some(max_parallel) = args.max_parallel {
            config.export.max_parallel_scans = Some(max_parallel);
        }
        if let Some(capacity) = args.queue_capacity {
            config.export.queue_capacity = capacity;
        }
        if args.append {
            config.export.open_mode = OpenMode::Append;
        }
    }

    /// Handle subcommands that need no connection
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Some(Commands::Tables) | None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("tabledump version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults apply");
            return;
        }

        match Config::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }

    /// Explain both invocation styles before the interactive setup starts
    pub fn print_usage_hint(&self) {
        if !self.args.quiet {
            println!("Non-interactive usage: tabledump [OPTIONS] <OUTPUT> <TABLE> <ATTRIBUTES>...");
            println!("Interactive usage: tabledump [OPTIONS]");
            println!();
        }
    }

    /// Print the connection target (credentials hidden)
    pub fn print_banner(&self) {
        if !self.args.quiet {
            println!(
                "Connecting to: {} (database {})",
                sanitize_uri(&self.config.connection.uri),
                self.config.connection.database
            );
        }
    }

    /// Print the outcome of an export
    pub fn print_summary(&self, target: &ExportTarget, report: &ExportReport) {
        if self.args.quiet {
            return;
        }

        if report.cancelled {
            println!(
                "Export cancelled: {} rows written to {}",
                report.rows_written,
                target.output.display()
            );
            return;
        }

        println!("Export completed: {}", target.output.display());
        println!(
            "  {} rows, {} segments, {} bytes in {} ms",
            report.rows_written, report.segments_scanned, report.bytes_written, report.elapsed_ms
        );
    }
}

/// Hide credentials in a connection URI
///
/// Everything between the scheme and `@` is replaced by `***`.
pub fn sanitize_uri(uri: &str) -> String {
    if let Some(proto_end) = uri.find("://") {
        if let Some(host_start) = uri.rfind('@') {
            if host_start > proto_end {
                let proto = &uri[..proto_end + 3];
                let host = &uri[host_start..];
                return format!("{}***{}", proto, host);
            }
        }
    }
    uri.to_string()
}
