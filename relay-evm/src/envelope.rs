//! EIP-155 legacy transactions.

use ethers_core::types::{Signature as EthSignature, TransactionRequest, H160, U256};
use relay_core::{RelayError, SignedTransaction, Signer, UnsignedTransaction};

/// Account and network fields the node supplies at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyFields {
    pub nonce: u64,
    pub gas_price: u128,
    /// The network's `eth_chainId`, not the relay chain id.
    pub chain_id: u64,
}

fn request(transaction: &UnsignedTransaction, fields: LegacyFields) -> Result<TransactionRequest, RelayError> {
    let to = transaction
        .target
        .to_evm()
        .ok_or_else(|| RelayError::Signing(format!("{} is not an EVM address", transaction.target)))?;
    let gas = transaction
        .gas_limit
        .ok_or_else(|| RelayError::Signing("EVM transaction has no gas limit".into()))?;

    Ok(TransactionRequest::new()
        .to(H160::from(to))
        .nonce(fields.nonce)
        .gas_price(fields.gas_price)
        .gas(gas)
        .value(transaction.value)
        .data(transaction.data.clone())
        .chain_id(fields.chain_id))
}

/// Keccak of the EIP-155 signing payload.
pub fn signing_hash(transaction: &UnsignedTransaction, fields: LegacyFields) -> Result<[u8; 32], RelayError> {
    Ok(request(transaction, fields)?.sighash().to_fixed_bytes())
}

/// Signs `transaction` and returns the RLP bytes `eth_sendRawTransaction` accepts.
pub fn sign_legacy(
    signer: &dyn Signer,
    transaction: UnsignedTransaction,
    fields: LegacyFields,
) -> Result<SignedTransaction, RelayError> {
    let request = request(&transaction, fields)?;
    let signature = signer.sign_payload(request.sighash().as_bytes())?;
    if signature.len() != 65 {
        return Err(RelayError::Signing(format!(
            "signer returned {} signature bytes, EVM needs a secp256k1 key",
            signature.len()
        )));
    }
    let recovery_id = signature[64]
        .checked_sub(27)
        .filter(|id| *id <= 1)
        .ok_or_else(|| RelayError::Signing(format!("unexpected recovery byte {}", signature[64])))?;

    let native = EthSignature {
        r: U256::from_big_endian(&signature[..32]),
        s: U256::from_big_endian(&signature[32..64]),
        v: u64::from(recovery_id) + fields.chain_id * 2 + 35,
    };
    let raw = request.rlp_signed(&native).to_vec();
    Ok(SignedTransaction {
        transaction,
        signer: signer.address(),
        signature,
        raw,
    })
}
