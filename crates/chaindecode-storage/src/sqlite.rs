//! SQLite storage backend for ChainDecode.
//!
//! Holds the ingestion table (`pending_txs`) next to the decoded tables in a
//! single SQLite file. Uses `sqlx` with WAL mode so the scheduler and the
//! priority path can read while the other writes.
//!
//! # Usage
//! ```rust,no_run
//! use chaindecode_storage::sqlite::SqliteDecodeStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteDecodeStore::open("./decode.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteDecodeStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chaindecode_core::{
    CommitSummary, Contract, DecodeStore, DecodedBundle, DecodedTransaction, LogEntry,
    PendingTx, PipelineError, Token, TokenTransfer,
};

use crate::collision_sentinel;
use crate::rows::{ContractRow, LogRow, PendingRow, TokenRow, TransferRow, TxRow, TX_COLUMNS};

fn storage(e: sqlx::Error) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

/// SQLite-backed decode store.
pub struct SqliteDecodeStore {
    pool: SqlitePool,
}

impl SqliteDecodeStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./decode.db"`) or a full
    /// SQLite URL (`"sqlite:./decode.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, PipelineError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would get its own private database, so the
    /// pool is capped at one connection.
    pub async fn in_memory() -> Result<Self, PipelineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), PipelineError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        // Written by the ingestion engine; read-only for the pipeline.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pending_txs (
                tx_key       TEXT    PRIMARY KEY,
                height       INTEGER NOT NULL,
                raw_tx       TEXT    NOT NULL,
                raw_response TEXT,
                gas_used     INTEGER
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS evm_transactions (
                tx_key                   TEXT    PRIMARY KEY,
                height                   INTEGER NOT NULL,
                hash                     TEXT    UNIQUE,
                from_address             TEXT,
                to_address               TEXT,
                nonce                    TEXT    NOT NULL,
                gas_limit                TEXT    NOT NULL,
                gas_price                TEXT,
                max_fee_per_gas          TEXT,
                max_priority_fee_per_gas TEXT,
                value                    TEXT    NOT NULL,
                input                    TEXT    NOT NULL,
                tx_type                  INTEGER NOT NULL,
                chain_id                 TEXT,
                gas_used                 TEXT,
                status                   TEXT    NOT NULL,
                vm_error                 TEXT,
                function_name            TEXT,
                function_signature       TEXT,
                decoded_args             TEXT,
                contract_address         TEXT,
                error                    TEXT
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS evm_logs (
                tx_key    TEXT    NOT NULL,
                log_index INTEGER NOT NULL,
                address   TEXT    NOT NULL,
                topics    TEXT    NOT NULL,
                data      TEXT    NOT NULL,
                PRIMARY KEY (tx_key, log_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS token_transfers (
                tx_key       TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                token        TEXT    NOT NULL,
                from_address TEXT    NOT NULL,
                to_address   TEXT    NOT NULL,
                value        TEXT    NOT NULL,
                token_type   TEXT    NOT NULL,
                PRIMARY KEY (tx_key, log_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                address    TEXT    PRIMARY KEY,
                token_type TEXT    NOT NULL,
                type_rank  INTEGER NOT NULL,
                verified   BOOLEAN NOT NULL DEFAULT 0
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contracts (
                address         TEXT    PRIMARY KEY,
                creator         TEXT    NOT NULL,
                creation_tx     TEXT    NOT NULL,
                creation_height INTEGER NOT NULL,
                bytecode_hash   TEXT
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pending_height ON pending_txs (height, tx_key);")
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_token ON token_transfers (token);")
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    /// Add an ingestion row. Existing keys are left untouched.
    pub async fn insert_pending(&self, tx: &PendingTx) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO pending_txs (tx_key, height, raw_tx, raw_response, gas_used)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&tx.tx_key)
        .bind(tx.height as i64)
        .bind(&tx.raw_tx)
        .bind(&tx.raw_response)
        .bind(tx.gas_used.map(|g| g as i64))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    // ─── Commit helpers ──────────────────────────────────────────────────────

    /// Insert-if-absent. Returns `false` when nothing was written.
    async fn insert_transaction(
        conn: &mut SqliteConnection,
        tx: &DecodedTransaction,
    ) -> Result<bool, PipelineError> {
        let r = TxRow::from_decoded(tx)?;
        let sql = format!(
            "INSERT INTO evm_transactions ({TX_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING"
        );
        let done = sqlx::query(&sql)
            .bind(r.tx_key)
            .bind(r.height)
            .bind(r.hash)
            .bind(r.from_address)
            .bind(r.to_address)
            .bind(r.nonce)
            .bind(r.gas_limit)
            .bind(r.gas_price)
            .bind(r.max_fee_per_gas)
            .bind(r.max_priority_fee_per_gas)
            .bind(r.value)
            .bind(r.input)
            .bind(r.tx_type)
            .bind(r.chain_id)
            .bind(r.gas_used)
            .bind(r.status)
            .bind(r.vm_error)
            .bind(r.function_name)
            .bind(r.function_signature)
            .bind(r.decoded_args)
            .bind(r.contract_address)
            .bind(r.error)
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(done.rows_affected() > 0)
    }

    async fn key_exists(conn: &mut SqliteConnection, tx_key: &str) -> Result<bool, PipelineError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM evm_transactions WHERE tx_key = ?")
            .bind(tx_key)
            .fetch_one(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(row.get::<i64, _>("cnt") > 0)
    }

    async fn hash_owner(conn: &mut SqliteConnection, hash: &str) -> Result<String, PipelineError> {
        let row = sqlx::query("SELECT tx_key FROM evm_transactions WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(row.map(|r| r.get::<String, _>("tx_key")).unwrap_or_default())
    }

    async fn insert_children(
        conn: &mut SqliteConnection,
        bundle: &DecodedBundle,
    ) -> Result<(), PipelineError> {
        for log in &bundle.logs {
            let r = LogRow::from_entry(log)?;
            sqlx::query(
                "INSERT INTO evm_logs (tx_key, log_index, address, topics, data)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT DO NOTHING",
            )
            .bind(r.tx_key)
            .bind(r.log_index)
            .bind(r.address)
            .bind(r.topics)
            .bind(r.data)
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        }

        for t in &bundle.transfers {
            sqlx::query(
                "INSERT INTO token_transfers
                    (tx_key, log_index, token, from_address, to_address, value, token_type)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT DO NOTHING",
            )
            .bind(&t.tx_key)
            .bind(t.log_index as i64)
            .bind(&t.token)
            .bind(&t.from)
            .bind(&t.to)
            .bind(&t.value)
            .bind(t.standard.as_str())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        }

        for token in &bundle.tokens {
            sqlx::query(
                "INSERT INTO tokens (address, token_type, type_rank, verified)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(address) DO UPDATE SET
                    token_type = excluded.token_type,
                    type_rank  = excluded.type_rank
                 WHERE excluded.type_rank > tokens.type_rank",
            )
            .bind(&token.address)
            .bind(token.standard.as_str())
            .bind(token.standard.rank() as i64)
            .bind(token.verified)
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        }

        if let Some(c) = &bundle.contract {
            sqlx::query(
                "INSERT INTO contracts (address, creator, creation_tx, creation_height, bytecode_hash)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(address) DO UPDATE SET
                    bytecode_hash = COALESCE(contracts.bytecode_hash, excluded.bytecode_hash)",
            )
            .bind(&c.address)
            .bind(&c.creator)
            .bind(&c.creation_tx)
            .bind(c.creation_height as i64)
            .bind(&c.bytecode_hash)
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        }

        Ok(())
    }
}

// ─── DecodeStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl DecodeStore for SqliteDecodeStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<PendingTx>, PipelineError> {
        let rows = sqlx::query_as::<_, PendingRow>(
            "SELECT p.tx_key, p.height, p.raw_tx, p.raw_response, p.gas_used
             FROM pending_txs p
             LEFT JOIN evm_transactions t ON t.tx_key = p.tx_key
             WHERE t.tx_key IS NULL
             ORDER BY p.height, p.tx_key
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(PendingTx::from).collect())
    }

    async fn fetch_pending_one(&self, tx_key: &str) -> Result<Option<PendingTx>, PipelineError> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT p.tx_key, p.height, p.raw_tx, p.raw_response, p.gas_used
             FROM pending_txs p
             LEFT JOIN evm_transactions t ON t.tx_key = p.tx_key
             WHERE p.tx_key = ? AND t.tx_key IS NULL",
        )
        .bind(tx_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(PendingTx::from))
    }

    async fn is_decoded(&self, tx_key: &str) -> Result<bool, PipelineError> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        Self::key_exists(&mut conn, tx_key).await
    }

    async fn commit(&self, bundles: &[DecodedBundle]) -> Result<CommitSummary, PipelineError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut summary = CommitSummary::default();

        for bundle in bundles {
            let decoded = &bundle.transaction;
            if Self::insert_transaction(&mut tx, decoded).await? {
                summary.written += 1;
                if decoded.is_sentinel() {
                    summary.sentinels += 1;
                }
                Self::insert_children(&mut tx, bundle).await?;
                continue;
            }

            if Self::key_exists(&mut tx, &decoded.tx_key).await? {
                summary.skipped += 1;
                continue;
            }

            // Not our key: the content hash belongs to another transaction.
            let hash = decoded.hash.as_deref().unwrap_or_default();
            let owner = Self::hash_owner(&mut tx, hash).await?;
            debug!(tx_key = %decoded.tx_key, owner = %owner, "content hash collision");
            if Self::insert_transaction(&mut tx, &collision_sentinel(decoded, &owner)).await? {
                summary.written += 1;
                summary.sentinels += 1;
            }
        }

        tx.commit().await.map_err(storage)?;
        debug!(
            written = summary.written,
            skipped = summary.skipped,
            sentinels = summary.sentinels,
            "batch committed"
        );
        Ok(summary)
    }

    async fn transaction(&self, tx_key: &str) -> Result<Option<DecodedTransaction>, PipelineError> {
        let sql = format!("SELECT {TX_COLUMNS} FROM evm_transactions WHERE tx_key = ?");
        let row = sqlx::query_as::<_, TxRow>(&sql)
            .bind(tx_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(TxRow::into_decoded).transpose()
    }

    async fn logs(&self, tx_key: &str) -> Result<Vec<LogEntry>, PipelineError> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT tx_key, log_index, address, topics, data
             FROM evm_logs WHERE tx_key = ? ORDER BY log_index",
        )
        .bind(tx_key)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(LogRow::into_entry).collect()
    }

    async fn transfers(&self, tx_key: &str) -> Result<Vec<TokenTransfer>, PipelineError> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT tx_key, log_index, token, from_address, to_address, value, token_type
             FROM token_transfers WHERE tx_key = ? ORDER BY log_index",
        )
        .bind(tx_key)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(TransferRow::into_transfer).collect()
    }

    async fn token(&self, address: &str) -> Result<Option<Token>, PipelineError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT address, token_type, verified FROM tokens WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(TokenRow::into_token).transpose()
    }

    async fn contract(&self, address: &str) -> Result<Option<Contract>, PipelineError> {
        let row = sqlx::query_as::<_, ContractRow>(
            "SELECT address, creator, creation_tx, creation_height, bytecode_hash
             FROM contracts WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Contract::from))
    }

    async fn pending_count(&self) -> Result<u64, PipelineError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM pending_txs p
             LEFT JOIN evm_transactions t ON t.tx_key = p.tx_key
             WHERE t.tx_key IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
