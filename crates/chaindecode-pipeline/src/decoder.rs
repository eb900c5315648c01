//! Per-transaction decode: envelope, execution result, logs, selector, deployment.
//!
//! [`TxDecoder::decode`] never fails. Envelope failures become sentinel
//! bundles; every other problem is logged and leaves the affected fields
//! at their defaults.

use std::sync::Arc;

use chaindecode_codec::{
    classify_logs, decode_execution_result, decode_transaction, track_creation,
    ETH_TX_RESPONSE_TYPE_URL,
};
use chaindecode_core::{DecodedBundle, ExecStatus, PendingTx};
use chaindecode_signatures::SignatureResolver;
use tracing::{debug, warn};

/// Runs one pending transaction through every decode stage.
pub struct TxDecoder {
    resolver: Option<Arc<SignatureResolver>>,
    response_type_url: String,
}

impl TxDecoder {
    pub fn new(resolver: Arc<SignatureResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            response_type_url: ETH_TX_RESPONSE_TYPE_URL.to_string(),
        }
    }

    /// A decoder that never resolves selectors.
    pub fn offline() -> Self {
        Self {
            resolver: None,
            response_type_url: ETH_TX_RESPONSE_TYPE_URL.to_string(),
        }
    }

    pub fn with_response_type_url(mut self, type_url: impl Into<String>) -> Self {
        self.response_type_url = type_url.into();
        self
    }

    pub async fn decode(&self, pending: &PendingTx) -> DecodedBundle {
        let key = pending.tx_key.as_str();

        let mut tx = match decode_transaction(key, pending.height, &pending.raw_tx) {
            Ok((_, tx)) => tx,
            Err(e) => {
                warn!(tx_key = %key, height = pending.height, error = %e, "undecodable envelope");
                return DecodedBundle::sentinel(pending, e.to_string());
            }
        };
        tx.gas_used = pending.gas_used;

        let mut logs = Vec::new();
        if let Some(raw) = &pending.raw_response {
            match decode_execution_result(key, raw, &self.response_type_url) {
                Ok(result) => {
                    tx.gas_used = Some(result.gas_used);
                    if let Some(vm_error) = result.vm_error {
                        tx.status = ExecStatus::Failed;
                        tx.vm_error = Some(vm_error);
                    }
                    logs = result.logs;
                }
                Err(e) => {
                    warn!(tx_key = %key, error = %e, "execution result unreadable, keeping base fields");
                }
            }
        }

        let classification = classify_logs(&logs);

        if let (Some(resolver), false) = (&self.resolver, tx.is_contract_creation()) {
            if let Some(call) = resolver.resolve(&tx.input).await {
                tx.function_name = Some(call.name);
                tx.function_signature = Some(call.signature);
                tx.decoded_args = call.args;
            }
        }

        let contract = track_creation(&mut tx);

        debug!(
            tx_key = %key,
            status = %tx.status,
            logs = logs.len(),
            transfers = classification.transfers.len(),
            function = tx.function_name.as_deref().unwrap_or("-"),
            "transaction decoded"
        );

        DecodedBundle {
            transaction: tx,
            logs,
            transfers: classification.transfers,
            tokens: classification.tokens,
            contract,
        }
    }
}
