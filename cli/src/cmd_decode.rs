//! `chaindecode decode`: decode one payload without a database.

use anyhow::{Context, Result};
use chaindecode_core::PendingTx;
use chaindecode_pipeline::TxDecoder;
use chaindecode_signatures::{FourByteClient, SignatureResolver};
use std::sync::Arc;
use std::time::Duration;

pub struct DecodeOpts {
    pub tx: String,
    pub response: Option<String>,
    /// Lookup service base URL; `None` skips selector resolution.
    pub lookup: Option<String>,
    pub height: u64,
    pub gas_used: Option<u64>,
}

pub async fn run(opts: DecodeOpts) -> Result<()> {
    let decoder = match &opts.lookup {
        Some(url) => {
            let client = FourByteClient::new(url.clone(), Duration::from_secs(5))
                .context("building lookup client")?;
            TxDecoder::new(Arc::new(SignatureResolver::new(Arc::new(client))))
        }
        None => TxDecoder::offline(),
    };

    let mut pending = PendingTx::new("cli", opts.height, opts.tx);
    pending.raw_response = opts.response;
    pending.gas_used = opts.gas_used;

    let bundle = decoder.decode(&pending).await;
    println!("{}", serde_json::to_string_pretty(&bundle)?);

    if bundle.is_sentinel() {
        anyhow::bail!(
            "envelope could not be decoded: {}",
            bundle.transaction.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
