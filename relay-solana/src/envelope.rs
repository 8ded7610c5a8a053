//! Legacy Solana wire transactions: one instruction, one fee-paying signer.

use relay_core::{Address, RelayError, SignedTransaction, Signer, UnsignedTransaction};

const SIGNATURE_LEN: usize = 64;

/// Appends `len` in the compact-u16 form used for every array length on the wire.
pub fn encode_length(out: &mut Vec<u8>, len: usize) -> Result<(), RelayError> {
    let mut rem = u16::try_from(len).map_err(|_| RelayError::Signing(format!("array of {len} items too long")))?;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

struct KeyEntry {
    key: Address,
    is_signer: bool,
    is_writable: bool,
}

/// Orders keys the way the runtime expects them: writable signers, readonly
/// signers, writable non-signers, readonly non-signers. The payer is always first.
fn collect_keys(transaction: &UnsignedTransaction, payer: &Address) -> Vec<KeyEntry> {
    let mut entries = vec![KeyEntry {
        key: *payer,
        is_signer: true,
        is_writable: true,
    }];
    let metas = transaction
        .accounts
        .iter()
        .map(|meta| (meta.pubkey, meta.is_signer, meta.is_writable))
        .chain(std::iter::once((transaction.target, false, false)));
    for (key, is_signer, is_writable) in metas {
        match entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.is_signer |= is_signer;
                entry.is_writable |= is_writable;
            }
            None => entries.push(KeyEntry { key, is_signer, is_writable }),
        }
    }

    let rank = |entry: &KeyEntry| match (entry.key == *payer, entry.is_signer, entry.is_writable) {
        (true, _, _) => 0,
        (false, true, true) => 1,
        (false, true, false) => 2,
        (false, false, true) => 3,
        (false, false, false) => 4,
    };
    entries.sort_by_key(rank);
    entries
}

/// Serialized legacy message: header, account keys, recent blockhash, one instruction.
pub fn compile_message(
    transaction: &UnsignedTransaction,
    payer: &Address,
    recent_blockhash: &[u8; 32],
) -> Result<Vec<u8>, RelayError> {
    let keys = collect_keys(transaction, payer);
    if let Some(extra) = keys.iter().skip(1).find(|entry| entry.is_signer) {
        return Err(RelayError::Signing(format!(
            "instruction needs a signature from {} which the relay does not hold",
            extra.key
        )));
    }
    let index_of = |key: &Address| -> Result<u8, RelayError> {
        let position = keys
            .iter()
            .position(|entry| entry.key == *key)
            .ok_or_else(|| RelayError::Signing(format!("account {key} missing from message")))?;
        u8::try_from(position).map_err(|_| RelayError::Signing("too many accounts for one message".into()))
    };

    let readonly_unsigned = keys.iter().filter(|entry| !entry.is_signer && !entry.is_writable).count();
    let mut message = vec![1, 0, readonly_unsigned as u8];
    encode_length(&mut message, keys.len())?;
    for entry in &keys {
        message.extend_from_slice(entry.key.as_bytes());
    }
    message.extend_from_slice(recent_blockhash);

    encode_length(&mut message, 1)?;
    message.push(index_of(&transaction.target)?);
    encode_length(&mut message, transaction.accounts.len())?;
    for meta in &transaction.accounts {
        message.push(index_of(&meta.pubkey)?);
    }
    encode_length(&mut message, transaction.data.len())?;
    message.extend_from_slice(&transaction.data);
    Ok(message)
}

/// Compiles, signs with the payer key and wraps the result in the wire format
/// `sendTransaction` accepts.
pub fn sign_transaction(
    signer: &dyn Signer,
    transaction: UnsignedTransaction,
    recent_blockhash: [u8; 32],
) -> Result<SignedTransaction, RelayError> {
    let payer = signer.address();
    let message = compile_message(&transaction, &payer, &recent_blockhash)?;
    let signature = signer.sign_payload(&message)?;
    if signature.len() != SIGNATURE_LEN {
        return Err(RelayError::Signing(format!(
            "signer returned {} signature bytes, SVM needs an ed25519 key",
            signature.len()
        )));
    }

    let mut raw = Vec::with_capacity(1 + SIGNATURE_LEN + message.len());
    encode_length(&mut raw, 1)?;
    raw.extend_from_slice(&signature);
    raw.extend_from_slice(&message);
    Ok(SignedTransaction {
        transaction,
        signer: payer,
        signature,
        raw,
    })
}
