//! ChainDecode CLI.
//!
//! # Commands
//! ```text
//! chaindecode run        --database <path> [--config <yaml>] [--batch-size N] [--poll-interval-ms MS]
//! chaindecode decode-one --database <path> --key <tx-key>
//! chaindecode decode     --tx <payload> [--response <payload>] [--lookup]
//! chaindecode status     --database <path>
//! chaindecode info
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd_decode;
mod cmd_run;

#[derive(Parser)]
#[command(
    name = "chaindecode",
    about = "ChainDecode CLI for the EVM transaction decode pipeline",
    long_about = "
ChainDecode CLI: decode raw EVM envelopes and execution results into
transactions, logs, token transfers and contract deployments.

ENVIRONMENT VARIABLES:
  CHAINDECODE_DATABASE           SQLite path or postgres:// URL
  CHAINDECODE_CONFIG             YAML pipeline configuration
  CHAINDECODE_BATCH_SIZE         Pending transactions per batch
  CHAINDECODE_POLL_INTERVAL_MS   Idle wait between polls
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Store selection shared by the commands that touch a database.
#[derive(clap::Args)]
struct DatabaseArgs {
    /// SQLite database path (created if missing) or a postgres:// URL
    #[arg(long, env = "CHAINDECODE_DATABASE", default_value = "./chaindecode.db")]
    database: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batch scheduler; tx keys from stdin (and, on Postgres, from
    /// NOTIFY on `priority.notify_channel`) go to the priority path
    Run {
        #[command(flatten)]
        db: DatabaseArgs,
        /// YAML configuration file
        #[arg(long, env = "CHAINDECODE_CONFIG")]
        config: Option<PathBuf>,
        /// Override `batch_size`
        #[arg(long, env = "CHAINDECODE_BATCH_SIZE")]
        batch_size: Option<usize>,
        /// Override `poll_interval_ms`
        #[arg(long, env = "CHAINDECODE_POLL_INTERVAL_MS")]
        poll_interval_ms: Option<u64>,
    },

    /// Decode and commit one pending transaction now
    #[command(name = "decode-one")]
    DecodeOne {
        #[command(flatten)]
        db: DatabaseArgs,
        /// Host-chain transaction key
        #[arg(long)]
        key: String,
        /// YAML configuration file
        #[arg(long, env = "CHAINDECODE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Decode a raw payload offline and print the result as JSON
    Decode {
        /// Transaction envelope (hex or base64)
        #[arg(long)]
        tx: String,
        /// Execution response (hex or base64)
        #[arg(long)]
        response: Option<String>,
        /// Resolve the function selector against the lookup service
        #[arg(long)]
        lookup: bool,
        /// Lookup service base URL
        #[arg(long, default_value = chaindecode_signatures::DEFAULT_LOOKUP_URL)]
        lookup_url: String,
        /// Block height to record
        #[arg(long, default_value_t = 0)]
        height: u64,
        /// Gas used, when known without a response
        #[arg(long)]
        gas_used: Option<u64>,
    },

    /// Show how much work is pending in a database
    Status {
        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Print defaults and supported formats
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            db,
            config,
            batch_size,
            poll_interval_ms,
        } => cmd_run::run(&db.database, config, batch_size, poll_interval_ms).await,
        Commands::DecodeOne { db, key, config } => {
            cmd_run::decode_one(&db.database, config, &key).await
        }
        Commands::Decode {
            tx,
            response,
            lookup,
            lookup_url,
            height,
            gas_used,
        } => {
            let opts = cmd_decode::DecodeOpts {
                tx,
                response,
                lookup: lookup.then_some(lookup_url),
                height,
                gas_used,
            };
            cmd_decode::run(opts).await
        }
        Commands::Status { db } => cmd_status(&db.database).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

async fn cmd_status(database: &str) -> Result<()> {
    let store = cmd_run::open_store(database).await?;
    let pending = store.pending_count().await.context("counting pending rows")?;
    println!("Database: {database}");
    println!("  Pending transactions: {pending}");
    Ok(())
}

fn cmd_info() {
    let defaults = chaindecode_pipeline::PipelineConfig::default();
    println!("ChainDecode v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default batch size: {}", defaults.batch_size);
    println!("  Default poll interval: {}ms", defaults.poll_interval_ms);
    println!("  Default error backoff: {}ms", defaults.error_backoff_ms);
    println!("  Response type: {}", defaults.response_type_url);
    println!("  Signature lookup: {}", defaults.signatures.lookup_url);
    println!("  Priority NOTIFY channel: {}", defaults.priority.notify_channel);
    println!("  Envelopes: legacy (EIP-155), 0x01 access-list, 0x02 dynamic-fee");
    println!("  Payload encodings: hex (0x-prefixed or bare), base64");
    println!("  Token standards: ERC-20, ERC-721, ERC-1155");
    println!("  Storage backends: memory, SQLite (file path), Postgres (postgres:// URL)");
}
