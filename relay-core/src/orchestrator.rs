//! Drives one transfer from submission to redemption.

use crate::adapter::{DestinationChainAdapter, SourceChainAdapter};
use crate::error::RelayError;
use crate::poller::AttestationPoller;
use crate::types::{Address, TransferIntent, TxRef};
use crate::vaa::VAA;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Initiated,
    Sent { sequence: u64, tx: TxRef },
    AwaitingAttestation { sequence: u64 },
    Attested(Box<VAA>),
    /// `tx` is `None` when the destination had already redeemed the attestation.
    Redeemed { sequence: u64, tx: Option<TxRef> },
    Failed(RelayError),
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Redeemed { .. } | RelayState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RelayState::Initiated => "initiated",
            RelayState::Sent { .. } => "sent",
            RelayState::AwaitingAttestation { .. } => "awaiting_attestation",
            RelayState::Attested(_) => "attested",
            RelayState::Redeemed { .. } => "redeemed",
            RelayState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    pub sequence: u64,
    pub emitter: Address,
    pub source_tx: Option<TxRef>,
    pub redeem_tx: Option<TxRef>,
    pub vaa: VAA,
}

/// One transfer's state machine. Owned by the task that drives it.
pub struct Relay {
    source: Arc<dyn SourceChainAdapter>,
    destination: Arc<dyn DestinationChainAdapter>,
    poller: Arc<AttestationPoller>,
    state: RelayState,
    history: Vec<RelayState>,
}

impl Relay {
    pub fn new(
        source: Arc<dyn SourceChainAdapter>,
        destination: Arc<dyn DestinationChainAdapter>,
        poller: Arc<AttestationPoller>,
    ) -> Self {
        Self {
            source,
            destination,
            poller,
            state: RelayState::Initiated,
            history: vec![RelayState::Initiated],
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[RelayState] {
        &self.history
    }

    pub async fn run(&mut self, intent: &TransferIntent) -> Result<RelayReceipt, RelayError> {
        let receipt = match self.source.send(intent).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(e)),
        };
        info!(
            source_chain = self.source.chain_id(),
            sequence = receipt.sequence,
            tx = %receipt.tx,
            "transfer submitted"
        );
        self.transition(RelayState::Sent {
            sequence: receipt.sequence,
            tx: receipt.tx.clone(),
        });

        self.complete(receipt.emitter, receipt.sequence, Some(receipt.tx)).await
    }

    /// Continues from a known sequence, e.g. after a timed-out wait.
    pub async fn resume(&mut self, sequence: u64) -> Result<RelayReceipt, RelayError> {
        let emitter = match self.source.emitter_address() {
            Ok(emitter) => emitter,
            Err(e) => return Err(self.fail(e)),
        };
        self.complete(emitter, sequence, None).await
    }

    async fn complete(
        &mut self,
        emitter: Address,
        sequence: u64,
        source_tx: Option<TxRef>,
    ) -> Result<RelayReceipt, RelayError> {
        let chain = self.source.chain_id();
        self.transition(RelayState::AwaitingAttestation { sequence });

        let vaa = match self.poller.await_attestation(chain, &emitter, sequence).await {
            Ok(vaa) => vaa,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = check_attestation(&vaa, chain, &emitter, sequence) {
            return Err(self.fail(e));
        }
        self.transition(RelayState::Attested(Box::new(vaa.clone())));

        let redeem_tx = match self.destination.redeem(&vaa).await {
            Ok(tx) => {
                info!(destination_chain = self.destination.chain_id(), sequence, %tx, "attestation redeemed");
                Some(tx)
            }
            Err(RelayError::AlreadyRedeemed) => {
                info!(destination_chain = self.destination.chain_id(), sequence, "attestation already redeemed");
                None
            }
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(RelayState::Redeemed {
            sequence,
            tx: redeem_tx.clone(),
        });

        Ok(RelayReceipt {
            sequence,
            emitter,
            source_tx,
            redeem_tx,
            vaa,
        })
    }

    fn transition(&mut self, next: RelayState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "relay transition");
        self.history.push(next.clone());
        self.state = next;
    }

    fn fail(&mut self, error: RelayError) -> RelayError {
        if error.is_recoverable() {
            warn!(from = self.state.name(), %error, "relay stopped; resumable with the same sequence");
        } else {
            warn!(from = self.state.name(), %error, "relay failed");
        }
        self.transition(RelayState::Failed(error.clone()));
        error
    }
}

fn check_attestation(vaa: &VAA, chain: u16, emitter: &Address, sequence: u64) -> Result<(), RelayError> {
    if vaa.emitter_chain != chain {
        return Err(RelayError::AttestationMismatch(format!(
            "emitter chain {} != {}",
            vaa.emitter_chain, chain
        )));
    }
    if vaa.emitter_address != *emitter {
        return Err(RelayError::AttestationMismatch(format!(
            "emitter {} != {}",
            vaa.emitter_address, emitter
        )));
    }
    if vaa.sequence != sequence {
        return Err(RelayError::AttestationMismatch(format!(
            "sequence {} != {}",
            vaa.sequence, sequence
        )));
    }
    Ok(())
}
