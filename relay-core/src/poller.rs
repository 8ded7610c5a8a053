//! Bounded polling of the guardian attestation service.

use crate::config::AttestationConfig;
use crate::error::RelayError;
use crate::types::{Address, ChainId};
use crate::vaa::VAA;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);
/// Upper bound on a single HTTP lookup.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Vec<u8>),
    NotFound,
}

/// Where signed attestations are looked up.
#[async_trait]
pub trait AttestationSource: Send + Sync {
    async fn fetch(&self, chain: ChainId, emitter: &Address, sequence: u64) -> Result<FetchOutcome, RelayError>;
}

#[derive(Deserialize)]
struct SignedVaaResponse {
    #[serde(rename = "vaaBytes")]
    vaa_bytes: String,
}

/// `GET {base}/v1/signed_vaa/{chain}/{emitter_hex}/{sequence}`.
pub struct HttpAttestationSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAttestationSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn lookup_path(chain: ChainId, emitter: &Address, sequence: u64) -> String {
        format!("/v1/signed_vaa/{}/{}/{}", chain, emitter.to_hex(), sequence)
    }

    pub fn lookup_url(&self, chain: ChainId, emitter: &Address, sequence: u64) -> String {
        format!("{}{}", self.base_url, Self::lookup_path(chain, emitter, sequence))
    }
}

#[async_trait]
impl AttestationSource for HttpAttestationSource {
    async fn fetch(&self, chain: ChainId, emitter: &Address, sequence: u64) -> Result<FetchOutcome, RelayError> {
        let url = self.lookup_url(chain, emitter, sequence);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "attestation not available");
            return Ok(FetchOutcome::NotFound);
        }

        let body: SignedVaaResponse = response.json().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.vaa_bytes.trim())
            .map_err(|e| RelayError::Rpc(format!("vaaBytes is not base64: {e}")))?;
        Ok(FetchOutcome::Found(bytes))
    }
}

pub struct AttestationPoller {
    source: Arc<dyn AttestationSource>,
    poll_interval: Duration,
    deadline: Duration,
}

impl AttestationPoller {
    pub fn new(source: Arc<dyn AttestationSource>, poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            source,
            poll_interval,
            deadline,
        }
    }

    pub fn from_config(source: Arc<dyn AttestationSource>, config: &AttestationConfig) -> Self {
        Self::new(source, config.poll_interval(), config.deadline())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Waits until the attestation exists or the deadline passes.
    ///
    /// Lookup failures count as "not yet available", and so does a lookup still
    /// running when the deadline arrives. Bytes that fail to decode are returned
    /// as a parse error immediately.
    pub async fn await_attestation(
        &self,
        chain: ChainId,
        emitter: &Address,
        sequence: u64,
    ) -> Result<VAA, RelayError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = self.deadline.saturating_sub(started.elapsed());
            let fetched = timeout(remaining, self.source.fetch(chain, emitter, sequence)).await;
            match fetched {
                Ok(Ok(FetchOutcome::Found(bytes))) => {
                    let vaa = VAA::decode(&bytes)?;
                    info!(
                        chain,
                        %emitter,
                        sequence,
                        attempt,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "attestation observed"
                    );
                    return Ok(vaa);
                }
                Ok(Ok(FetchOutcome::NotFound)) => {
                    debug!(chain, sequence, attempt, "attestation pending");
                }
                Ok(Err(e)) => {
                    warn!(chain, sequence, attempt, error = %e, "attestation lookup failed, retrying");
                }
                Err(_) => {
                    warn!(chain, sequence, attempt, "attestation lookup still running at deadline");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                return Err(RelayError::Timeout {
                    chain,
                    emitter: *emitter,
                    sequence,
                    waited_secs: elapsed.as_secs(),
                });
            }
            sleep(self.poll_interval.min(self.deadline - elapsed)).await;
        }
    }
}
