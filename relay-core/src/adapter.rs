//! Per-chain submission surface. One implementation per chain family.

use crate::error::RelayError;
use crate::types::{Address, ChainId, Registration, SendReceipt, TransferIntent, TxRef};
use crate::vaa::VAA;
use async_trait::async_trait;

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// The address attestations from this chain's program carry as emitter.
    fn emitter_address(&self) -> Result<Address, RelayError>;

    /// The address foreign chains register for this endpoint. Differs from the
    /// emitter when a token bridge emits on the integration's behalf.
    fn endpoint_address(&self) -> Result<Address, RelayError> {
        self.emitter_address()
    }

    /// Records `address` as the trusted endpoint for `chain`.
    ///
    /// Re-registering the current value returns [`Registration::Unchanged`]
    /// without submitting anything.
    async fn register_foreign_endpoint(&self, chain: ChainId, address: &Address) -> Result<Registration, RelayError>;

    async fn registered_endpoint(&self, chain: ChainId) -> Result<Option<Address>, RelayError>;
}

#[async_trait]
pub trait SourceChainAdapter: ChainAdapter {
    /// Submits the transfer after pre-flight checks. The returned sequence is read from the chain.
    async fn send(&self, intent: &TransferIntent) -> Result<SendReceipt, RelayError>;
}

#[async_trait]
pub trait DestinationChainAdapter: ChainAdapter {
    /// Checks the predicted replay record. Advisory only.
    async fn is_redeemed(&self, vaa: &VAA) -> Result<bool, RelayError>;

    async fn redeem(&self, vaa: &VAA) -> Result<TxRef, RelayError>;
}

pub fn validate_recipient(source_chain: ChainId, recipient_chain: ChainId, recipient: &Address) -> Result<(), RelayError> {
    if recipient_chain == 0 {
        return Err(RelayError::InvalidRecipient("recipient chain 0".into()));
    }
    if recipient_chain == source_chain {
        return Err(RelayError::InvalidRecipient(format!(
            "recipient chain {recipient_chain} is the source chain"
        )));
    }
    if recipient.is_zero() {
        return Err(RelayError::InvalidRecipient("zero address".into()));
    }
    Ok(())
}

pub fn validate_foreign_endpoint(local_chain: ChainId, chain: ChainId, address: &Address) -> Result<(), RelayError> {
    if chain == 0 || chain == local_chain {
        return Err(RelayError::InvalidForeignEndpoint(format!(
            "chain {chain} cannot be registered on chain {local_chain}"
        )));
    }
    if address.is_zero() {
        return Err(RelayError::InvalidForeignEndpoint("zero address".into()));
    }
    Ok(())
}

/// Read-back comparison shared by adapters before submitting a registration.
pub fn registration_needed(current: Option<Address>, requested: &Address) -> bool {
    current.as_ref() != Some(requested)
}
