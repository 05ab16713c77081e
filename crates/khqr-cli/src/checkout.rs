//! # Checkout Subcommand
//!
//! Builds checkout details for one order and prints them as JSON. With
//! `--qr-out` the QR image is also written as a PNG file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rust_decimal::Decimal;

use khqr_client::{qr, CheckoutDetails, KhqrEngine};
use khqr_core::payload::CheckoutRequest;

/// Arguments for the `khqr checkout` subcommand.
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Plan or product identifier.
    #[arg(long)]
    pub plan: String,

    /// Amount to collect, in major units (e.g. 29.99).
    #[arg(long)]
    pub amount: Decimal,

    /// Currency code (USD or KHR).
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Storefront order id. Defaults to the plan id.
    #[arg(long, default_value = "")]
    pub order: String,

    /// Write the QR code PNG to this path.
    #[arg(long)]
    pub qr_out: Option<PathBuf>,
}

impl CheckoutArgs {
    /// The request this invocation describes.
    pub fn to_request(&self) -> CheckoutRequest {
        CheckoutRequest {
            plan_id: self.plan.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            order_id: self.order.clone(),
        }
    }
}

/// Execute the checkout subcommand.
pub async fn run_checkout(args: &CheckoutArgs, engine: &KhqrEngine) -> Result<u8> {
    let details = engine
        .generate_checkout_details(&args.to_request())
        .await
        .context("generating checkout details")?;

    if let Some(out) = &args.qr_out {
        write_qr_png(&details, out)?;
        tracing::info!(path = %out.display(), "QR code written");
    }

    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(0)
}

/// Write the checkout's QR image to `path`.
///
/// Inline PNG data URLs are decoded as-is. Remote image URLs are not
/// fetched; the payload is rendered locally instead.
pub fn write_qr_png(details: &CheckoutDetails, path: &Path) -> Result<()> {
    let png = match qr::decode_data_url(&details.qr_code) {
        Some(bytes) => bytes,
        None => qr::render_png(&details.khqr_payload.payload)?,
    };
    std::fs::write(path, png).with_context(|| format!("writing {}", path.display()))
}
