//! In-memory storage backend.
//!
//! Holds the ingestion rows and every decoded table in RAM behind one lock,
//! so a commit is atomic with respect to concurrent readers and writers.
//! Useful for testing and for the offline CLI paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use chaindecode_core::{
    CommitSummary, Contract, DecodeStore, DecodedBundle, DecodedTransaction, LogEntry,
    PendingTx, PipelineError, Token, TokenTransfer,
};

use crate::collision_sentinel;

#[derive(Default)]
struct Tables {
    /// Ingestion rows, never removed.
    pending: HashMap<String, PendingTx>,
    transactions: HashMap<String, DecodedTransaction>,
    /// content hash → tx key
    hashes: HashMap<String, String>,
    logs: BTreeMap<(String, u32), LogEntry>,
    transfers: BTreeMap<(String, u32), TokenTransfer>,
    tokens: HashMap<String, Token>,
    contracts: HashMap<String, Contract>,
}

impl Tables {
    fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key) && !self.transactions.contains_key(key)
    }

    fn insert_transaction(&mut self, tx: DecodedTransaction) {
        if let Some(hash) = &tx.hash {
            self.hashes.insert(hash.clone(), tx.tx_key.clone());
        }
        self.transactions.insert(tx.tx_key.clone(), tx);
    }

    fn upsert_token(&mut self, token: &Token) {
        self.tokens
            .entry(token.address.clone())
            .and_modify(|existing| {
                if token.standard.rank() > existing.standard.rank() {
                    existing.standard = token.standard;
                }
            })
            .or_insert_with(|| token.clone());
    }

    fn upsert_contract(&mut self, contract: &Contract) {
        self.contracts
            .entry(contract.address.clone())
            .and_modify(|existing| {
                if existing.bytecode_hash.is_none() {
                    existing.bytecode_hash = contract.bytecode_hash.clone();
                }
            })
            .or_insert_with(|| contract.clone());
    }
}

/// In-memory decode store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryDecodeStore {
    tables: Mutex<Tables>,
}

impl MemoryDecodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an ingestion row (the ingestion engine's side of the contract).
    pub fn insert_pending(&self, tx: PendingTx) {
        self.lock().pending.entry(tx.tx_key.clone()).or_insert(tx);
    }

    /// Number of decoded transaction rows, sentinels included.
    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    /// Number of stored token transfers.
    pub fn transfer_count(&self) -> usize {
        self.lock().transfers.len()
    }
}

#[async_trait]
impl DecodeStore for MemoryDecodeStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<PendingTx>, PipelineError> {
        let tables = self.lock();
        let mut pending: Vec<&PendingTx> = tables
            .pending
            .values()
            .filter(|p| !tables.transactions.contains_key(&p.tx_key))
            .collect();
        pending.sort_by(|a, b| (a.height, &a.tx_key).cmp(&(b.height, &b.tx_key)));
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn fetch_pending_one(&self, tx_key: &str) -> Result<Option<PendingTx>, PipelineError> {
        let tables = self.lock();
        if !tables.is_pending(tx_key) {
            return Ok(None);
        }
        Ok(tables.pending.get(tx_key).cloned())
    }

    async fn is_decoded(&self, tx_key: &str) -> Result<bool, PipelineError> {
        Ok(self.lock().transactions.contains_key(tx_key))
    }

    async fn commit(&self, bundles: &[DecodedBundle]) -> Result<CommitSummary, PipelineError> {
        let mut tables = self.lock();
        let mut summary = CommitSummary::default();

        for bundle in bundles {
            let tx = &bundle.transaction;
            if tables.transactions.contains_key(&tx.tx_key) {
                summary.skipped += 1;
                continue;
            }

            let owner = tx.hash.as_ref().and_then(|h| tables.hashes.get(h).cloned());
            if let Some(owner) = owner {
                debug!(tx_key = %tx.tx_key, owner = %owner, "content hash collision");
                tables.insert_transaction(collision_sentinel(tx, &owner));
                summary.written += 1;
                summary.sentinels += 1;
                continue;
            }

            tables.insert_transaction(tx.clone());
            summary.written += 1;
            if tx.is_sentinel() {
                summary.sentinels += 1;
            }

            for log in &bundle.logs {
                tables
                    .logs
                    .entry((log.tx_key.clone(), log.index))
                    .or_insert_with(|| log.clone());
            }
            for transfer in &bundle.transfers {
                tables
                    .transfers
                    .entry((transfer.tx_key.clone(), transfer.log_index))
                    .or_insert_with(|| transfer.clone());
            }
            for token in &bundle.tokens {
                tables.upsert_token(token);
            }
            if let Some(contract) = &bundle.contract {
                tables.upsert_contract(contract);
            }
        }

        Ok(summary)
    }

    async fn transaction(&self, tx_key: &str) -> Result<Option<DecodedTransaction>, PipelineError> {
        Ok(self.lock().transactions.get(tx_key).cloned())
    }

    async fn logs(&self, tx_key: &str) -> Result<Vec<LogEntry>, PipelineError> {
        Ok(self
            .lock()
            .logs
            .values()
            .filter(|l| l.tx_key == tx_key)
            .cloned()
            .collect())
    }

    async fn transfers(&self, tx_key: &str) -> Result<Vec<TokenTransfer>, PipelineError> {
        Ok(self
            .lock()
            .transfers
            .values()
            .filter(|t| t.tx_key == tx_key)
            .cloned()
            .collect())
    }

    async fn token(&self, address: &str) -> Result<Option<Token>, PipelineError> {
        Ok(self.lock().tokens.get(address).cloned())
    }

    async fn contract(&self, address: &str) -> Result<Option<Contract>, PipelineError> {
        Ok(self.lock().contracts.get(address).cloned())
    }

    async fn pending_count(&self) -> Result<u64, PipelineError> {
        let tables = self.lock();
        Ok(tables
            .pending
            .keys()
            .filter(|k| !tables.transactions.contains_key(*k))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chaindecode_core::{ExecStatus, TokenStandard};

    #[tokio::test]
    async fn pending_is_ordered_and_limited() {
        let store = MemoryDecodeStore::new();
        store.insert_pending(PendingTx::new("b", 2, "0x"));
        store.insert_pending(PendingTx::new("a", 2, "0x"));
        store.insert_pending(PendingTx::new("z", 1, "0x"));

        let keys: Vec<String> = store
            .fetch_pending(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.tx_key)
            .collect();
        assert_eq!(keys, vec!["z", "a", "b"]);
        assert_eq!(store.fetch_pending(1).await.unwrap().len(), 1);
        assert_eq!(store.pending_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn commit_removes_from_pending() {
        let store = MemoryDecodeStore::new();
        store.insert_pending(PendingTx::new("k1", 1, "0x"));
        store.insert_pending(PendingTx::new("k2", 1, "0x"));

        let summary = store.commit(&[bundle("k1", "0x01")]).await.unwrap();
        assert_eq!(summary.written, 1);
        assert!(store.is_decoded("k1").await.unwrap());
        assert!(store.fetch_pending_one("k1").await.unwrap().is_none());
        assert!(store.fetch_pending_one("k2").await.unwrap().is_some());
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_commit_is_a_noop() {
        let store = MemoryDecodeStore::new();
        store.commit(&[bundle("k1", "0x01")]).await.unwrap();

        let mut richer = bundle("k1", "0x01");
        richer.transaction.function_name = Some("changed".into());
        let summary = store.commit(&[richer]).await.unwrap();
        assert_eq!(summary, CommitSummary { written: 0, skipped: 1, sentinels: 0 });

        let stored = store.transaction("k1").await.unwrap().unwrap();
        assert_eq!(stored.function_name, None);
        assert_eq!(store.logs("k1").await.unwrap().len(), 1);
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn hash_collision_writes_sentinel() {
        let store = MemoryDecodeStore::new();
        store.commit(&[bundle("k1", "0xaa")]).await.unwrap();
        let summary = store.commit(&[bundle("k2", "0xaa")]).await.unwrap();
        assert_eq!(summary.sentinels, 1);

        let row = store.transaction("k2").await.unwrap().unwrap();
        assert_eq!(row.status, ExecStatus::DecodeFailed);
        assert!(row.hash.is_none());
        assert!(store.logs("k2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_rank_only_rises() {
        let store = MemoryDecodeStore::new();
        let mut first = bundle("k1", "0x01");
        first.tokens = vec![Token::inferred(TOKEN, TokenStandard::Erc721)];
        let mut second = bundle("k2", "0x02");
        second.tokens = vec![Token::inferred(TOKEN, TokenStandard::Erc20)];
        let mut third = bundle("k3", "0x03");
        third.tokens = vec![Token::inferred(TOKEN, TokenStandard::Erc1155)];

        store.commit(&[first]).await.unwrap();
        store.commit(&[second]).await.unwrap();
        assert_eq!(store.token(TOKEN).await.unwrap().unwrap().standard, TokenStandard::Erc721);
        store.commit(&[third]).await.unwrap();
        assert_eq!(store.token(TOKEN).await.unwrap().unwrap().standard, TokenStandard::Erc1155);
    }

    #[tokio::test]
    async fn contract_keeps_first_creator() {
        let store = MemoryDecodeStore::new();
        let mut first = bundle("k1", "0x01");
        first.contract = Some(contract("k1", None));
        let mut second = bundle("k2", "0x02");
        let mut c = contract("k2", Some("0xbeef"));
        c.creator = "0xother".into();
        second.contract = Some(c);

        store.commit(&[first]).await.unwrap();
        store.commit(&[second]).await.unwrap();
        let stored = store.contract(CONTRACT).await.unwrap().unwrap();
        assert_eq!(stored.creation_tx, "k1");
        assert_eq!(stored.creator, CREATOR);
        assert_eq!(stored.bytecode_hash.as_deref(), Some("0xbeef"));
    }
}
