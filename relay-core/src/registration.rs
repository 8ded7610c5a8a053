//! Mutual endpoint registration between two chains.

use crate::adapter::ChainAdapter;
use crate::error::RelayError;
use crate::types::{Address, ChainId, Registration};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRegistration {
    pub local: Registration,
    pub remote: Registration,
}

/// Registers `remote_address` on the local chain and the local endpoint on the
/// remote chain, then reads both back.
pub async fn register_pair(
    local: &dyn ChainAdapter,
    remote: &dyn ChainAdapter,
    remote_chain_id: ChainId,
    remote_address: &Address,
) -> Result<PairRegistration, RelayError> {
    if remote.chain_id() != remote_chain_id {
        return Err(RelayError::InvalidForeignEndpoint(format!(
            "remote adapter serves chain {}, not {}",
            remote.chain_id(),
            remote_chain_id
        )));
    }

    let local_chain_id = local.chain_id();
    let local_address = local.endpoint_address()?;

    let on_local = local.register_foreign_endpoint(remote_chain_id, remote_address).await?;
    info!(chain = local_chain_id, foreign_chain = remote_chain_id, outcome = ?on_local, "foreign endpoint registered");

    let on_remote = remote.register_foreign_endpoint(local_chain_id, &local_address).await?;
    info!(chain = remote_chain_id, foreign_chain = local_chain_id, outcome = ?on_remote, "foreign endpoint registered");

    verify(local, remote_chain_id, remote_address).await?;
    verify(remote, local_chain_id, &local_address).await?;

    Ok(PairRegistration {
        local: on_local,
        remote: on_remote,
    })
}

async fn verify(adapter: &dyn ChainAdapter, foreign_chain: ChainId, expected: &Address) -> Result<(), RelayError> {
    let actual = adapter.registered_endpoint(foreign_chain).await?.unwrap_or(Address::ZERO);
    if actual != *expected {
        return Err(RelayError::RegistrationVerificationFailed {
            chain: adapter.chain_id(),
            expected: *expected,
            actual,
        });
    }
    Ok(())
}
