//! `chaindecode run` and `chaindecode decode-one`.

use anyhow::{Context, Result};
use chaindecode_core::DecodeStore;
use chaindecode_pipeline::{init_tracing, Pipeline, PipelineConfig};
use chaindecode_storage::{PgTriggerListener, PostgresDecodeStore, SqliteDecodeStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// `postgres://` and `postgresql://` select the Postgres backend.
pub(crate) fn is_postgres_url(database: &str) -> bool {
    database.starts_with("postgres://") || database.starts_with("postgresql://")
}

/// Open the backend `database` names: a Postgres URL or a SQLite path.
pub(crate) async fn open_store(database: &str) -> Result<Arc<dyn DecodeStore>> {
    if is_postgres_url(database) {
        let store = PostgresDecodeStore::connect(database)
            .await
            .context("connecting to postgres")?;
        Ok(Arc::new(store))
    } else {
        let store = SqliteDecodeStore::open(database)
            .await
            .with_context(|| format!("opening {database}"))?;
        Ok(Arc::new(store))
    }
}

async fn build(database: &str, config: PipelineConfig) -> Result<Pipeline> {
    init_tracing(&config.log).context("initialising tracing")?;
    let store = open_store(database).await?;
    Pipeline::from_config(config, store).context("building pipeline")
}

/// One tx key per stdin line.
async fn forward_stdin(triggers: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if !line.trim().is_empty() => {
                if triggers.send(line.trim().to_string()).await.is_err() {
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        }
    }
}

pub async fn run(
    database: &str,
    config: Option<PathBuf>,
    batch_size: Option<usize>,
    poll_interval_ms: Option<u64>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(n) = batch_size {
        config.batch_size = n;
    }
    if let Some(ms) = poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    config.validate().context("invalid configuration")?;
    let notify_channel = config.priority.notify_channel.clone();

    let pipeline = build(database, config).await?;
    let (triggers, rx) = pipeline.trigger_channel();
    let cancel = CancellationToken::new();

    // `triggers` stays alive until shutdown, so the priority listener
    // outlives a closed stdin.
    let mut feeds = vec![tokio::spawn(forward_stdin(triggers.clone()))];

    if is_postgres_url(database) {
        let listener = PgTriggerListener::connect(database, &notify_channel)
            .await
            .with_context(|| format!("listening on {notify_channel}"))?;
        let (sender, cancel) = (triggers.clone(), cancel.clone());
        feeds.push(tokio::spawn(async move {
            listener.forward(sender, cancel).await;
        }));
    }

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown.cancel();
    });

    info!(database = %database, "chaindecode running");
    pipeline.run(rx, cancel).await;
    for feed in feeds {
        feed.abort();
    }
    drop(triggers);

    let stats = pipeline.stats().snapshot();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn decode_one(database: &str, config: Option<PathBuf>, key: &str) -> Result<()> {
    let config = load_config(config)?;
    let pipeline = build(database, config).await?;
    let outcome = pipeline
        .priority()
        .decode_with_timeout(key)
        .await
        .with_context(|| format!("decoding {key}"))?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_urls_select_postgres() {
        assert!(is_postgres_url("postgres://localhost/chaindecode"));
        assert!(is_postgres_url("postgresql://user@db:5432/x"));
        assert!(!is_postgres_url("./chaindecode.db"));
        assert!(!is_postgres_url("sqlite:decode.db"));
    }

    #[tokio::test]
    async fn sqlite_path_opens_store() {
        let path = std::env::temp_dir().join(format!("chaindecode-cli-{}.db", std::process::id()));
        let path = path.to_string_lossy().into_owned();
        let store = open_store(&path).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
