use crate::error::RelayError;
use crate::utils::to_32_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain identifier in the guardian network's namespace.
pub type ChainId = u16;

pub const CHAIN_ID_SOLANA: ChainId = 1;
pub const CHAIN_ID_ETHEREUM: ChainId = 2;
pub const CHAIN_ID_BASE: ChainId = 30;

/// Canonical 32-byte address. Narrower native addresses are left-zero-padded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Left-pads a native address (20-byte EVM, 32-byte Solana) into canonical form.
    pub fn from_native(bytes: &[u8]) -> Self {
        Self(to_32_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Lowercase hex, no `0x`. This is the form the attestation service expects.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Accepts `0x`-prefixed or bare hex of up to 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, RelayError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| RelayError::Config(format!("invalid hex address {s}: {e}")))?;
        if bytes.len() > 32 {
            return Err(RelayError::Config(format!("address {s} longer than 32 bytes")));
        }
        Ok(Self::from_native(&bytes))
    }

    pub fn from_base58(s: &str) -> Result<Self, RelayError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| RelayError::Config(format!("invalid base58 address {s}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RelayError::Config(format!("base58 address {s} is not 32 bytes")))?;
        Ok(Self(bytes))
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// The 20-byte EVM address, if the upper 12 bytes are zero.
    pub fn to_evm(&self) -> Option<[u8; 20]> {
        if self.0[..12].iter().any(|&b| b != 0) {
            return None;
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.0[12..]);
        Some(out)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GuardianSet {
    pub index: u32,
    pub keys: Vec<[u8; 20]>,
    pub creation_time: i64,
    pub expiration_time: u32,
}

impl GuardianSet {
    pub fn is_active(&self) -> bool {
        self.expiration_time == 0 ||
        self.expiration_time > chrono::Utc::now().timestamp() as u32
    }

    /// Two thirds plus one, the quorum destination chains enforce.
    pub fn quorum(&self) -> usize {
        self.keys.len() * 2 / 3 + 1
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub chain_type: ChainType,
    pub name: String,
    pub rpc_url: String,
    /// Core bridge contract (EVM) or program id (SVM).
    pub core_address: String,
    /// The messenger or token-bridge integration this client talks to.
    pub program_address: String,
    /// Token bridge contract / program, required for token transfers.
    #[serde(default)]
    pub token_bridge_address: Option<String>,
    #[serde(default)]
    pub mode: ProgramMode,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ChainType {
    EVM,
    SVM,
}

/// Which integration the adapter drives on its chain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgramMode {
    #[default]
    Messenger,
    TokenBridge,
}

/// What the caller wants moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferIntent {
    Message {
        payload: Vec<u8>,
    },
    Tokens {
        /// Mint (SVM) or ERC-20 contract (EVM), canonical form.
        token: Address,
        /// Amount in the token's native decimals.
        amount: u64,
        recipient_chain: ChainId,
        recipient: Address,
        batch_id: u32,
    },
}

/// Reference to a submitted native transaction (signature or hash).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxRef(pub String);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful `send`; `sequence` always comes from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub sequence: u64,
    pub emitter: Address,
    pub tx: TxRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Submitted(TxRef),
    /// The chain already held this exact value; nothing was submitted.
    Unchanged,
}
