//! Deterministic program-derived addresses.
//!
//! An address is `sha256(seeds || [bump] || program_id || "ProgramDerivedAddress")`
//! for the highest bump whose hash is not an ed25519 point, so no private key
//! can exist for it. Contract-model chains have nothing to derive; their
//! emitter is the contract address left-padded.

use crate::error::DeriveError;
use crate::types::{Address, ChainId};
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

pub const MAX_SEED_LEN: usize = 32;
pub const MAX_SEEDS: usize = 16;
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

pub const SEED_CONFIG: &[u8] = b"config";
pub const SEED_EMITTER: &[u8] = b"emitter";
pub const SEED_FOREIGN_EMITTER: &[u8] = b"foreign_emitter";
pub const SEED_RECEIVED: &[u8] = b"received";
pub const SEED_SENT: &[u8] = b"sent";
pub const SEED_SENDER: &[u8] = b"sender";
pub const SEED_REDEEMER: &[u8] = b"redeemer";
pub const SEED_FOREIGN_CONTRACT: &[u8] = b"foreign_contract";
pub const SEED_BRIDGED: &[u8] = b"bridged";
pub const SEED_TMP: &[u8] = b"tmp";
pub const SEED_BRIDGE: &[u8] = b"Bridge";
pub const SEED_SEQUENCE: &[u8] = b"Sequence";
pub const SEED_POSTED_VAA: &[u8] = b"PostedVAA";
pub const SEED_FEE_COLLECTOR: &[u8] = b"fee_collector";
pub const SEED_GUARDIAN_SET: &[u8] = b"GuardianSet";
pub const SEED_AUTHORITY_SIGNER: &[u8] = b"authority_signer";
pub const SEED_CUSTODY_SIGNER: &[u8] = b"custody_signer";
pub const SEED_MINT_SIGNER: &[u8] = b"mint_signer";
pub const SEED_WRAPPED: &[u8] = b"wrapped";
pub const SEED_META: &[u8] = b"meta";

pub const TOKEN_PROGRAM_ID: Address = Address([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133, 237,
    95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// The address for `seeds` under `root_id`, discarding the bump.
pub fn derive(root_id: &Address, seeds: &[&[u8]]) -> Result<Address, DeriveError> {
    find_program_address(seeds, root_id).map(|(address, _)| address)
}

pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<(Address, u8), DeriveError> {
    validate_seeds(seeds, 1)?;
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let candidate = hash_seeds(seeds, Some(&bump_seed), program_id);
        if !is_on_curve(&candidate) {
            return Ok((candidate, bump));
        }
    }
    Err(DeriveError::NoViableBump)
}

/// Single attempt with caller-supplied seeds (bump included if any).
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address, DeriveError> {
    validate_seeds(seeds, 0)?;
    let candidate = hash_seeds(seeds, None, program_id);
    if is_on_curve(&candidate) {
        return Err(DeriveError::OnCurve);
    }
    Ok(candidate)
}

fn validate_seeds(seeds: &[&[u8]], reserved: usize) -> Result<(), DeriveError> {
    if seeds.len() + reserved > MAX_SEEDS {
        return Err(DeriveError::TooManySeeds(seeds.len()));
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(DeriveError::InvalidSeed { index, len: seed.len() });
    }
    Ok(())
}

fn hash_seeds(seeds: &[&[u8]], bump: Option<&[u8; 1]>, program_id: &Address) -> Address {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    if let Some(bump) = bump {
        hasher.update(bump);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    Address(hasher.finalize().into())
}

fn is_on_curve(candidate: &Address) -> bool {
    VerifyingKey::from_bytes(candidate.as_bytes()).is_ok()
}

/// Contract-model emitter: the 20-byte contract address left-padded.
pub fn evm_address_to_universal(address: &[u8; 20]) -> Address {
    Address::from_native(address)
}

// Seed layouts of the programs the client talks to.

pub fn config_address(program_id: &Address) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_CONFIG])
}

pub fn emitter_address(program_id: &Address) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_EMITTER])
}

pub fn foreign_emitter_address(program_id: &Address, chain: ChainId) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_FOREIGN_EMITTER, &chain.to_le_bytes()])
}

/// Messenger replay record, keyed by `(emitter_chain, sequence)`.
pub fn received_address(program_id: &Address, emitter_chain: ChainId, sequence: u64) -> Result<Address, DeriveError> {
    derive(
        program_id,
        &[SEED_RECEIVED, &emitter_chain.to_le_bytes(), &sequence.to_le_bytes()],
    )
}

pub fn sent_message_address(program_id: &Address, sequence: u64) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_SENT, &sequence.to_le_bytes()])
}

pub fn sender_config_address(program_id: &Address) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_SENDER])
}

pub fn redeemer_config_address(program_id: &Address) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_REDEEMER])
}

pub fn foreign_contract_address(program_id: &Address, chain: ChainId) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_FOREIGN_CONTRACT, &chain.to_le_bytes()])
}

pub fn bridged_message_address(program_id: &Address, sequence: u64) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_BRIDGED, &sequence.to_le_bytes()])
}

pub fn tmp_token_address(program_id: &Address, mint: &Address) -> Result<Address, DeriveError> {
    derive(program_id, &[SEED_TMP, mint.as_bytes()])
}

pub fn core_bridge_address(core_program: &Address) -> Result<Address, DeriveError> {
    derive(core_program, &[SEED_BRIDGE])
}

pub fn fee_collector_address(core_program: &Address) -> Result<Address, DeriveError> {
    derive(core_program, &[SEED_FEE_COLLECTOR])
}

pub fn sequence_tracker_address(core_program: &Address, emitter: &Address) -> Result<Address, DeriveError> {
    derive(core_program, &[SEED_SEQUENCE, emitter.as_bytes()])
}

pub fn posted_vaa_address(core_program: &Address, message_hash: &[u8; 32]) -> Result<Address, DeriveError> {
    derive(core_program, &[SEED_POSTED_VAA, message_hash])
}

pub fn guardian_set_address(core_program: &Address, index: u32) -> Result<Address, DeriveError> {
    derive(core_program, &[SEED_GUARDIAN_SET, &index.to_be_bytes()])
}

pub fn token_bridge_config_address(token_bridge: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[SEED_CONFIG])
}

pub fn authority_signer_address(token_bridge: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[SEED_AUTHORITY_SIGNER])
}

pub fn custody_signer_address(token_bridge: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[SEED_CUSTODY_SIGNER])
}

pub fn mint_authority_address(token_bridge: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[SEED_MINT_SIGNER])
}

/// Custody token account holding locked native tokens of `mint`.
pub fn custody_address(token_bridge: &Address, mint: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[mint.as_bytes()])
}

pub fn wrapped_mint_address(
    token_bridge: &Address,
    token_chain: ChainId,
    token_address: &Address,
) -> Result<Address, DeriveError> {
    derive(
        token_bridge,
        &[SEED_WRAPPED, &token_chain.to_be_bytes(), token_address.as_bytes()],
    )
}

/// Exists only for mints the token bridge created.
pub fn wrapped_meta_address(token_bridge: &Address, mint: &Address) -> Result<Address, DeriveError> {
    derive(token_bridge, &[SEED_META, mint.as_bytes()])
}

/// Token-bridge replay record, keyed by `(emitter_address, emitter_chain, sequence)`.
pub fn claim_address(
    token_bridge: &Address,
    emitter_address: &Address,
    emitter_chain: ChainId,
    sequence: u64,
) -> Result<Address, DeriveError> {
    derive(
        token_bridge,
        &[emitter_address.as_bytes(), &emitter_chain.to_be_bytes(), &sequence.to_be_bytes()],
    )
}

/// Token bridge registration of a foreign token bridge emitter.
pub fn endpoint_registration_address(
    token_bridge: &Address,
    chain: ChainId,
    emitter: &Address,
) -> Result<Address, DeriveError> {
    derive(token_bridge, &[&chain.to_be_bytes(), emitter.as_bytes()])
}

pub fn associated_token_address(owner: &Address, mint: &Address) -> Result<Address, DeriveError> {
    derive(
        &ASSOCIATED_TOKEN_PROGRAM_ID,
        &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
    )
}
