//! # Status Subcommands
//!
//! - `khqr status <md5>` asks once and prints the reconciled result.
//! - `khqr status <md5> --watch` keeps asking every `--interval` seconds
//!   until the status is terminal or `--timeout` elapses.
//! - `khqr bulk <md5>...` lists which hashes the Bakong fallback reports
//!   as paid.
//!
//! Exit codes: `0` paid (or bulk success), `2` terminal but unpaid,
//! `3` still open when the watch timed out or after a single check.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use khqr_client::KhqrEngine;
use khqr_core::status::{PaymentStatus, PaymentStatusResult};

/// Exit code for a terminal status other than `PAID`.
pub const EXIT_NOT_PAID: u8 = 2;

/// Exit code for a status that is not terminal yet.
pub const EXIT_OPEN: u8 = 3;

/// Arguments for the `khqr status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Settlement hash returned by `khqr checkout`.
    pub md5: String,

    /// Keep polling until the payment reaches a terminal status.
    #[arg(long)]
    pub watch: bool,

    /// Seconds between polls.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Give up polling after this many seconds.
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,
}

/// Arguments for the `khqr bulk` subcommand.
#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Settlement hashes to check (at most 50).
    #[arg(required = true)]
    pub md5s: Vec<String>,
}

/// Map a reconciled status to the process exit code.
pub fn exit_code(status: PaymentStatus) -> u8 {
    match status {
        PaymentStatus::Paid => 0,
        s if s.is_terminal() => EXIT_NOT_PAID,
        _ => EXIT_OPEN,
    }
}

/// Execute the status subcommand.
pub async fn run_status(args: &StatusArgs, engine: &KhqrEngine) -> Result<u8> {
    let result = if args.watch {
        watch(args, engine).await?
    } else {
        check_once(engine, &args.md5).await?
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(exit_code(result.status))
}

async fn check_once(engine: &KhqrEngine, md5: &str) -> Result<PaymentStatusResult> {
    engine
        .check_bakong_payment_status(md5)
        .await
        .with_context(|| format!("checking payment status for {md5}"))
}

/// Poll until the status is terminal or the deadline passes.
///
/// Retryable failures on an individual poll (timeouts, 429, 5xx) are
/// logged and retried at the next tick; anything else ends the loop.
async fn watch(args: &StatusArgs, engine: &KhqrEngine) -> Result<PaymentStatusResult> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.timeout);
    let interval = Duration::from_secs(args.interval);
    let mut last: Option<PaymentStatusResult> = None;

    loop {
        match engine.check_bakong_payment_status(&args.md5).await {
            Ok(result) => {
                tracing::info!(md5 = %args.md5, status = %result.status, "polled payment status");
                if result.status.is_terminal() {
                    return Ok(result);
                }
                last = Some(result);
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(md5 = %args.md5, error = %e, "status poll failed");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("checking payment status for {}", args.md5));
            }
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }

    tracing::warn!(md5 = %args.md5, timeout_secs = args.timeout, "watch timed out");
    match last {
        Some(result) => Ok(result),
        None => check_once(engine, &args.md5).await,
    }
}

/// Execute the bulk subcommand.
pub async fn run_bulk(args: &BulkArgs, engine: &KhqrEngine) -> Result<u8> {
    if !engine.fallback().is_configured() {
        tracing::warn!("Bakong fallback is not configured; no hashes can be confirmed");
    }

    let paid = engine
        .fallback()
        .check_bulk(&args.md5s)
        .await
        .context("bulk status check")?;

    println!("{}", serde_json::to_string_pretty(&paid)?);
    Ok(0)
}
