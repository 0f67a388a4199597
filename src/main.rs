//! tabledump - parallel table export to CSV
//!
//! Exports every record of a MongoDB collection to a CSV file by scanning
//! disjoint segments concurrently and writing through a single buffered
//! writer.
//!
//! # Usage
//!
//! ```bash
//! # Non-interactive export
//! tabledump users.csv users id name email
//!
//! # Interactive setup (choose table and attributes)
//! tabledump
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use tabledump::cli::interactive::{TerminalInput, run_interactive};
use tabledump::cli::{CliInterface, ExportTarget};
use tabledump::connection::ConnectionManager;
use tabledump::discovery;
use tabledump::error::Result;
use tabledump::export::{
    ExportOptions, ExportRequest, MongoRowSource, ProjectionSpec, RowSource, ScanCoordinator,
};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// This function orchestrates the application startup:
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle offline subcommands
/// 4. Connect, run the export or table listing, disconnect
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    if cli.export_target().is_none() && !cli.wants_table_listing() {
        cli.print_usage_hint();
    }
    cli.print_banner();

    let mut connection = ConnectionManager::new(cli.config().connection.clone());
    connection.connect().await?;
    if let Ok(version) = connection.server_version().await {
        debug!("MongoDB server version {}", version);
    }

    let source = Arc::new(MongoRowSource::new(
        connection.database()?,
        cli.config().export.scan_batch_size,
    ));

    // Release the client whatever the outcome
    let outcome = run_with_source(&cli, source).await;
    connection.disconnect().await;
    outcome
}

/// Run the requested action against a connected row source
async fn run_with_source(cli: &CliInterface, source: Arc<dyn RowSource>) -> Result<()> {
    if cli.wants_table_listing() {
        for table in discovery::list_tables(source.as_ref()).await? {
            println!("{}", table);
        }
        return Ok(());
    }

    let target = match cli.export_target() {
        Some(target) => target,
        None => {
            let mut input = TerminalInput::new();
            let selected = run_interactive(
                &mut input,
                source.as_ref(),
                cli.config().export.sample_size,
                cli.args().output.clone(),
                cli.args().table.clone(),
            )
            .await?;

            match selected {
                Some(target) => target,
                None => return Ok(()),
            }
        }
    };

    export(cli, source, &target).await
}

/// Run one export with Ctrl+C wired to cancellation
async fn export(cli: &CliInterface, source: Arc<dyn RowSource>, target: &ExportTarget) -> Result<()> {
    let request = ExportRequest {
        output: target.output.clone(),
        table: target.table.clone(),
        projection: ProjectionSpec::new(target.attributes.iter().cloned())?,
    };

    let mut options = ExportOptions::from(&cli.config().export);
    options.show_progress = cli.show_progress();

    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let mut coordinator =
        ScanCoordinator::new(source, request, options).with_cancellation(cancel_token);
    let result = coordinator.execute().await;

    ctrl_c_handle.abort();

    let report = result?;
    cli.print_summary(target, &report);
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so they never mix with listings on stdout.
///
/// # Arguments
/// * `cli` - CLI interface with the merged logging settings
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
