use crate::error::RelayError;
use crate::types::{Address, ChainId, GuardianSet};
use ed25519_dalek::Signer as _;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Address) -> Self {
        Self { pubkey, is_signer: false, is_writable: true }
    }

    pub fn readonly(pubkey: Address) -> Self {
        Self { pubkey, is_signer: false, is_writable: false }
    }

    pub fn signer(pubkey: Address) -> Self {
        Self { pubkey, is_signer: true, is_writable: true }
    }
}

/// A chain call before signing. Adapters build it; the chain crate wraps it in the
/// native envelope and asks the [`Signer`] for the signature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain: ChainId,
    /// Program id (SVM) or contract (EVM).
    pub target: Address,
    /// Account list for SVM instructions; empty on EVM.
    pub accounts: Vec<AccountMeta>,
    /// Instruction data or ABI calldata.
    pub data: Vec<u8>,
    /// Native value attached to the call.
    pub value: u128,
    pub gas_limit: Option<u64>,
}

impl UnsignedTransaction {
    pub fn new(chain: ChainId, target: Address, data: Vec<u8>) -> Self {
        Self {
            chain,
            target,
            accounts: Vec::new(),
            data,
            value: 0,
            gas_limit: None,
        }
    }

    pub fn with_accounts(mut self, accounts: Vec<AccountMeta>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub signer: Address,
    pub signature: Vec<u8>,
    /// Chain-native encoding: an EIP-155 RLP transaction on EVM, a legacy
    /// wire transaction on SVM.
    pub raw: Vec<u8>,
}

impl SignedTransaction {
    /// Bytes accepted by `eth_sendRawTransaction` or `sendTransaction`.
    pub fn to_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// The single signing capability injected into every chain adapter.
///
/// Signers hold keys only. Each chain crate compiles its own envelope and hands
/// the signer the payload that envelope commits to.
pub trait Signer: Send + Sync {
    /// Canonical address of the signing account.
    fn address(&self) -> Address;

    /// Signs a chain signing payload. Secp256k1 keys take a 32-byte digest and
    /// return `r || s || v` with `v` in {27, 28}; ed25519 keys sign the message bytes.
    fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>, RelayError>;
}

/// Recoverable ECDSA over keccak256, the EVM key type.
pub struct Secp256k1Signer {
    secret_key: SecretKey,
    secp: Secp256k1<secp256k1::All>,
}

impl Secp256k1Signer {
    pub fn new(private_key_hex: &str) -> Result<Self, RelayError> {
        let private_key_bytes = hex::decode(private_key_hex.trim().trim_start_matches("0x"))
            .map_err(|e| RelayError::Signing(format!("invalid private key hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&private_key_bytes)
            .map_err(|e| RelayError::Signing(e.to_string()))?;
        let secp = Secp256k1::new();

        Ok(Self { secret_key, secp })
    }

    /// 65-byte `r || s || v` signature with `v` in {27, 28}.
    pub fn sign_digest(&self, digest: [u8; 32]) -> Result<[u8; 65], RelayError> {
        let message = Message::from_digest_slice(&digest).map_err(|e| RelayError::Signing(e.to_string()))?;
        let sig = self.secp.sign_ecdsa_recoverable(&message, &self.secret_key);

        let (recovery_id, compact_sig) = sig.serialize_compact();

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&compact_sig);
        out[64] = 27 + recovery_id.to_i32() as u8;
        Ok(out)
    }

    pub fn get_address(&self) -> [u8; 20] {
        let public_key = PublicKey::from_secret_key(&self.secp, &self.secret_key);
        public_key_to_address(&public_key)
    }
}

impl Signer for Secp256k1Signer {
    fn address(&self) -> Address {
        Address::from_native(&self.get_address())
    }

    fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>, RelayError> {
        let digest: [u8; 32] = payload
            .try_into()
            .map_err(|_| RelayError::Signing(format!("secp256k1 payload is {} bytes, expected a digest", payload.len())))?;
        Ok(self.sign_digest(digest)?.to_vec())
    }
}

/// Ed25519 over the raw message bytes, the SVM key type.
pub struct Ed25519Signer {
    key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            key: ed25519_dalek::SigningKey::from_bytes(secret),
        }
    }

    /// 64-byte `secret || public` keypair, the layout of a Solana keypair file.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        let bytes: &[u8; 64] = bytes
            .try_into()
            .map_err(|_| RelayError::Signing(format!("keypair is {} bytes, expected 64", bytes.len())))?;
        let key = ed25519_dalek::SigningKey::from_keypair_bytes(bytes)
            .map_err(|e| RelayError::Signing(e.to_string()))?;
        Ok(Self { key })
    }

    /// Parses the JSON byte-array keypair format.
    pub fn from_keypair_json(json: &str) -> Result<Self, RelayError> {
        let bytes: Vec<u8> = serde_json::from_str(json)
            .map_err(|e| RelayError::Signing(format!("invalid keypair json: {e}")))?;
        Self::from_keypair_bytes(&bytes)
    }
}

impl Signer for Ed25519Signer {
    fn address(&self) -> Address {
        Address(self.key.verifying_key().to_bytes())
    }

    fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>, RelayError> {
        Ok(self.key.sign(payload).to_bytes().to_vec())
    }
}

fn public_key_to_address(public_key: &PublicKey) -> [u8; 20] {
    let public_key_bytes = public_key.serialize_uncompressed();

    let mut hasher = Keccak256::new();
    hasher.update(&public_key_bytes[1..]);
    let hash = hasher.finalize();

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

pub fn verify_guardian_signature(
    message_hash: [u8; 32],
    signature: &[u8; 65],
    guardian_index: u8,
    guardian_set: &GuardianSet,
) -> Result<(), RelayError> {
    let guardian_key = guardian_set.keys
        .get(guardian_index as usize)
        .ok_or_else(|| RelayError::Signing(format!("invalid guardian index {guardian_index}")))?;

    let recovered_address = recover_signer(message_hash, signature)?;

    if recovered_address != *guardian_key {
        return Err(RelayError::Signing("signature verification failed".into()));
    }

    Ok(())
}

pub fn recover_signer(message_hash: [u8; 32], signature: &[u8; 65]) -> Result<[u8; 20], RelayError> {
    let secp = Secp256k1::new();
    let signing = |e: secp256k1::Error| RelayError::Signing(e.to_string());

    let mut compact_sig = [0u8; 64];
    compact_sig.copy_from_slice(&signature[0..64]);
    let v = signature[64];
    let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(i32::from(if v >= 27 { v - 27 } else { v }))
        .map_err(signing)?;

    let recoverable_sig = secp256k1::ecdsa::RecoverableSignature::from_compact(&compact_sig, recovery_id)
        .map_err(signing)?;
    let message = Message::from_digest_slice(&message_hash).map_err(signing)?;
    let public_key = secp.recover_ecdsa(&message, &recoverable_sig).map_err(signing)?;

    Ok(public_key_to_address(&public_key))
}
