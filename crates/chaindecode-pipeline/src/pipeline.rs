//! Wires the decoder, scheduler and priority path around one store.

use std::sync::Arc;
use std::time::Duration;

use chaindecode_core::{DecodeStore, PipelineError};
use chaindecode_signatures::{
    FourByteClient, MemorySignatureCache, SignatureCache, SignatureLookup, SignatureResolver,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::decoder::TxDecoder;
use crate::priority::PriorityDecoder;
use crate::scheduler::{BatchScheduler, SchedulerOptions};
use crate::stats::PipelineStats;

/// A configured pipeline: one [`BatchScheduler`] and one [`PriorityDecoder`]
/// sharing a store, a decoder and the stats counters.
pub struct Pipeline {
    config: PipelineConfig,
    scheduler: Arc<BatchScheduler>,
    priority: Arc<PriorityDecoder>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Build with the configured 4byte lookup service.
    pub fn from_config(
        config: PipelineConfig,
        store: Arc<dyn DecodeStore>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let client = FourByteClient::new(config.signatures.lookup_url.clone(), config.lookup_timeout())
            .map_err(|e| PipelineError::Config(format!("signature lookup client: {e}")))?;
        Ok(Self::with_lookup(config, store, Arc::new(client)))
    }

    /// Build with a caller-supplied lookup (e.g. a `StaticLookup`).
    pub fn with_lookup(
        config: PipelineConfig,
        store: Arc<dyn DecodeStore>,
        lookup: Arc<dyn SignatureLookup>,
    ) -> Self {
        let cache: Arc<dyn SignatureCache> = match config.signatures.cache_ttl_secs {
            Some(secs) => Arc::new(MemorySignatureCache::with_ttl(Duration::from_secs(secs))),
            None => Arc::new(MemorySignatureCache::new()),
        };
        let resolver = Arc::new(SignatureResolver::with_cache(lookup, cache));
        let decoder =
            TxDecoder::new(resolver).with_response_type_url(config.response_type_url.clone());
        Self::with_decoder(config, store, decoder)
    }

    pub fn with_decoder(
        config: PipelineConfig,
        store: Arc<dyn DecodeStore>,
        decoder: TxDecoder,
    ) -> Self {
        let decoder = Arc::new(decoder);
        let stats = Arc::new(PipelineStats::new());
        let scheduler = Arc::new(BatchScheduler::new(
            Arc::clone(&store),
            Arc::clone(&decoder),
            SchedulerOptions::from(&config),
            Arc::clone(&stats),
        ));
        let priority = Arc::new(PriorityDecoder::new(
            store,
            decoder,
            config.request_timeout(),
            Arc::clone(&stats),
        ));
        Self {
            config,
            scheduler,
            priority,
            stats,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    pub fn priority(&self) -> &Arc<PriorityDecoder> {
        &self.priority
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// A trigger channel sized by `priority.channel_capacity`.
    pub fn trigger_channel(&self) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(self.config.priority.channel_capacity)
    }

    /// Run the scheduler and the priority listener until `cancel` fires.
    pub async fn run(&self, triggers: mpsc::Receiver<String>, cancel: CancellationToken) {
        tokio::join!(
            self.scheduler.run(cancel.clone()),
            Arc::clone(&self.priority).listen(triggers, cancel),
        );
    }
}
