//! DealerScan application shell.
//!
//! This is the thin command-line shell that wires configuration, logging and
//! the scan service together. Core logic lives in the `crates/` directory.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dealerscan_core::AppConfig;
use dealerscan_scanner::ScanService;
use std::time::Duration;
use tracing::info;

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "dealerscan", version, about = "Scan a dealer locator by postal code")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the work list in the background and report progress until done
    Scan {
        /// Only visit every Nth postal code
        #[arg(short, long)]
        sparsify: Option<usize>,
        /// Seconds between progress reports
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
    },
    /// Run the scan logic on a few postal codes without writing output
    Test {
        /// Postal codes to look up
        #[arg(required = true)]
        zips: Vec<String>,
    },
    /// Print the raw locator records for one postal code
    Debug {
        /// Postal code to look up
        zip: String,
    },
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dealerscan=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Parse arguments, then run the requested command to completion.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting DealerScan v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    let service = ScanService::from_config(&config)?;

    match cli.command {
        Command::Scan {
            sparsify,
            poll_secs,
        } => {
            let sparsify = sparsify.unwrap_or(config.scan.default_sparsify);
            scan(&service, sparsify, Duration::from_secs(poll_secs.max(1))).await
        }
        Command::Test { zips } => {
            let summary = service.run_test_scan(zips.as_slice()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Debug { zip } => {
            let records = service.debug_one(&zip).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
    }
}

async fn scan(service: &ScanService, sparsify: usize, poll: Duration) -> anyhow::Result<()> {
    let response = service.start_scan(sparsify)?;
    if !response.accepted {
        bail!("a scan is already running");
    }

    let mut ticker = tokio::time::interval(poll);
    let mut stopping = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c(), if !stopping => {
                result.context("failed to listen for Ctrl-C")?;
                service.shutdown();
                stopping = true;
            }
        }

        let status = service.get_status();
        info!(
            "{} {}/{} ({:.1}%), {} dealers, {} errors",
            status.status,
            status.state.processed,
            status.state.total,
            status.percent_complete,
            status.state.accepted,
            status.state.errors
        );
        if !status.state.running {
            break;
        }
    }

    println!("{}", serde_json::to_string_pretty(&service.get_status())?);
    Ok(())
}
