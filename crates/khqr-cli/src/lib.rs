//! # khqr-cli -- Operator CLI for KHQR checkouts
//!
//! ## Subcommands
//!
//! - `khqr checkout` -- build checkout details and print them as JSON.
//! - `khqr status` -- check one settlement hash, optionally polling.
//! - `khqr bulk` -- ask the Bakong fallback which hashes are paid.
//!
//! ```bash
//! khqr checkout --plan local-3m --amount 29.99 --currency USD --order ORD-1001 --qr-out qr.png
//! khqr status 5d41402abc4b2a76b9719d911017c592 --watch --interval 3 --timeout 120
//! ```
//!
//! Configuration comes from the environment, see
//! [`khqr_client::KhqrConfig::from_env`].

pub mod checkout;
pub mod status;

use anyhow::{Context, Result};
use khqr_client::{KhqrConfig, KhqrEngine};

/// Load configuration from the environment and build an engine.
pub fn engine_from_env() -> Result<KhqrEngine> {
    let config = KhqrConfig::from_env().context("loading KHQR configuration")?;
    tracing::debug!(?config, "configuration loaded");
    KhqrEngine::new(config).context("building KHQR engine")
}
