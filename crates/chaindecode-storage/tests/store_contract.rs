//! The same commit rules checked against every backend.

use alloy_primitives::U256;
use chaindecode_core::{
    DecodeStore, DecodedBundle, DecodedTransaction, ExecStatus, PendingTx, Token, TokenStandard,
};
use chaindecode_storage::MemoryDecodeStore;

fn decoded(key: &str, hash: &str, height: u64) -> DecodedBundle {
    let mut tx = DecodedTransaction::sentinel(key, height, "");
    tx.status = ExecStatus::Success;
    tx.error = None;
    tx.hash = Some(hash.to_string());
    tx.value = U256::from(10u64).pow(U256::from(30u64));
    let mut bundle = DecodedBundle::new(tx);
    bundle.tokens.push(Token::inferred(
        "0x00000000000000000000000000000000000000aa",
        TokenStandard::Erc721,
    ));
    bundle
}

/// Ten pending rows, one of them a sentinel, committed in one batch.
async fn batch_with_sentinel(store: &dyn DecodeStore) {
    let mut bundles: Vec<DecodedBundle> = (0..9u64)
        .map(|i| decoded(&format!("k{i}"), &format!("0x{i:02x}"), i))
        .collect();
    bundles.push(DecodedBundle::sentinel(
        &PendingTx::new("k-bad", 4, "0x00"),
        "unsupported transaction type 0x00",
    ));

    let summary = store.commit(&bundles).await.unwrap();
    assert_eq!(summary.written, 10);
    assert_eq!(summary.sentinels, 1);
    assert_eq!(store.pending_count().await.unwrap(), 0);

    let big = store.transaction("k3").await.unwrap().unwrap();
    assert_eq!(big.value.to_string(), "1000000000000000000000000000000");
    assert!(store.transaction("k-bad").await.unwrap().unwrap().is_sentinel());

    // Replaying the batch changes nothing.
    let replay = store.commit(&bundles).await.unwrap();
    assert_eq!(replay.written, 0);
    assert_eq!(replay.skipped, 10);
    assert_eq!(
        store
            .token("0x00000000000000000000000000000000000000aa")
            .await
            .unwrap()
            .unwrap()
            .standard,
        TokenStandard::Erc721
    );
}

#[tokio::test]
async fn memory_store_batch() {
    let store = MemoryDecodeStore::new();
    for i in 0..9u64 {
        store.insert_pending(PendingTx::new(format!("k{i}"), i, "0x"));
    }
    store.insert_pending(PendingTx::new("k-bad", 4, "0x00"));
    batch_with_sentinel(&store).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_store_batch() {
    let store = chaindecode_storage::SqliteDecodeStore::in_memory().await.unwrap();
    for i in 0..9u64 {
        store
            .insert_pending(&PendingTx::new(format!("k{i}"), i, "0x"))
            .await
            .unwrap();
    }
    store
        .insert_pending(&PendingTx::new("k-bad", 4, "0x00"))
        .await
        .unwrap();
    batch_with_sentinel(&store).await;
}
