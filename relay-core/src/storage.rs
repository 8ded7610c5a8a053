use crate::error::{ParseError, RelayError};
use crate::poller::{AttestationSource, FetchOutcome};
use crate::types::{Address, ChainId};
use crate::vaa::VAA;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type AttestationKey = (ChainId, Address, u64);

/// In-memory signed attestations keyed by `(emitter_chain, emitter, sequence)`.
#[derive(Clone, Default)]
pub struct AttestationStore {
    vaas: Arc<RwLock<HashMap<AttestationKey, Vec<u8>>>>,
}

impl AttestationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_vaa(&self, vaa: &VAA) -> Result<(), ParseError> {
        let bytes = vaa.encode()?;
        self.store_raw((vaa.emitter_chain, vaa.emitter_address, vaa.sequence), bytes).await;
        Ok(())
    }

    /// Stores bytes as-is, without checking that they decode.
    pub async fn store_raw(&self, key: AttestationKey, bytes: Vec<u8>) {
        self.vaas.write().await.insert(key, bytes);
    }

    pub async fn get_vaa_bytes(&self, chain: ChainId, emitter: &Address, sequence: u64) -> Option<Vec<u8>> {
        self.vaas.read().await.get(&(chain, *emitter, sequence)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.vaas.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.vaas.read().await.is_empty()
    }
}

#[async_trait]
impl AttestationSource for AttestationStore {
    async fn fetch(&self, chain: ChainId, emitter: &Address, sequence: u64) -> Result<FetchOutcome, RelayError> {
        Ok(match self.get_vaa_bytes(chain, emitter, sequence).await {
            Some(bytes) => FetchOutcome::Found(bytes),
            None => FetchOutcome::NotFound,
        })
    }
}
