//! # khqr CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! the subcommand handlers in `khqr_cli`.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use khqr_cli::checkout::{run_checkout, CheckoutArgs};
use khqr_cli::status::{run_bulk, run_status, BulkArgs, StatusArgs};

/// KHQR checkout and payment status tool.
///
/// Builds KHQR payloads for storefront orders and reconciles their payment
/// status against the status backend and the Bakong Open API.
#[derive(Parser, Debug)]
#[command(name = "khqr", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate checkout details (payload, QR image, settlement hash).
    Checkout(CheckoutArgs),

    /// Check the payment status of one settlement hash.
    Status(StatusArgs),

    /// Check many settlement hashes against the Bakong fallback.
    Bulk(BulkArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(dispatch(&cli.command)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(command: &Commands) -> anyhow::Result<u8> {
    let engine = khqr_cli::engine_from_env()?;
    match command {
        Commands::Checkout(args) => run_checkout(args, &engine).await,
        Commands::Status(args) => run_status(args, &engine).await,
        Commands::Bulk(args) => run_bulk(args, &engine).await,
    }
}
