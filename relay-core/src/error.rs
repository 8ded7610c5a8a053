use crate::types::{Address, ChainId};
use thiserror::Error;

/// Malformed attestation or payload bytes. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("truncated: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("too many signatures: {0} (max 255)")]
    TooManySignatures(usize),

    #[error("unknown payload type {0}")]
    UnknownPayloadType(u8),

    #[error("{0} trailing bytes after fixed-width payload")]
    TrailingBytes(usize),

    #[error("message payload is {0} bytes (max 1024)")]
    PayloadTooLarge(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("seed {index} is {len} bytes (max 32)")]
    InvalidSeed { index: usize, len: usize },

    #[error("{0} seeds supplied (max 16)")]
    TooManySeeds(usize),

    #[error("derived address lies on the ed25519 curve")]
    OnCurve,

    #[error("no bump seed yields an off-curve address")]
    NoViableBump,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("invalid seed: {0}")]
    InvalidSeed(#[from] DeriveError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("attestation for chain={chain} emitter={emitter} sequence={sequence} not observed within {waited_secs}s")]
    Timeout {
        chain: ChainId,
        emitter: Address,
        sequence: u64,
        waited_secs: u64,
    },

    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: u128, have: u128 },

    #[error("insufficient allowance: need {need}, approved {approved}")]
    InsufficientAllowance { need: u128, approved: u128 },

    #[error("endpoint for chain {0} already registered")]
    AlreadyRegistered(ChainId),

    #[error("attestation already redeemed")]
    AlreadyRedeemed,

    #[error("registration on chain {chain} reads back {actual}, expected {expected}")]
    RegistrationVerificationFailed {
        chain: ChainId,
        expected: Address,
        actual: Address,
    },

    #[error("attestation does not match transfer: {0}")]
    AttestationMismatch(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("amount truncates to zero")]
    ZeroAmount,

    #[error("invalid foreign endpoint: {0}")]
    InvalidForeignEndpoint(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rpc failure: {0}")]
    Rpc(String),
}

impl RelayError {
    /// Errors that leave the relay in a state the caller may resume from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelayError::Timeout { .. })
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Rpc(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Rpc(format!("malformed response: {err}"))
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
