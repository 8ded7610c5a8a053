//! On-chain account layouts the adapter reads.

use relay_core::utils::{read_u64_le, sha256};
use relay_core::{Address, ChainId, RelayError};

pub const DISCRIMINATOR_LEN: usize = 8;

pub const SYSTEM_PROGRAM_ID: Address = Address([0; 32]);

pub const SYSVAR_CLOCK_ID: Address = Address([
    6, 167, 213, 23, 24, 199, 116, 201, 40, 86, 99, 152, 105, 29, 94, 182, 139, 94, 184, 163, 155,
    75, 109, 92, 115, 85, 91, 33, 0, 0, 0, 0,
]);

pub const SYSVAR_RENT_ID: Address = Address([
    6, 167, 213, 23, 25, 44, 92, 81, 33, 140, 201, 76, 61, 74, 241, 127, 88, 218, 238, 8, 155,
    161, 253, 68, 227, 219, 217, 138, 0, 0, 0, 0,
]);

/// Signature fee charged per transaction signature.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

const BRIDGE_FEE_OFFSET: usize = 16;
const TOKEN_AMOUNT_OFFSET: usize = 64;

/// `sha256("account:<Name>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = sha256(format!("account:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// `ForeignEmitter` (messenger) and `ForeignContract` (token integration) share this prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignEndpointAccount {
    pub chain: ChainId,
    pub address: Address,
}

impl ForeignEndpointAccount {
    pub const LEN: usize = DISCRIMINATOR_LEN + 2 + 32;

    pub fn parse(data: &[u8]) -> Result<Self, RelayError> {
        if data.len() < Self::LEN {
            return Err(RelayError::Rpc(format!(
                "foreign endpoint account is {} bytes, expected at least {}",
                data.len(),
                Self::LEN
            )));
        }
        let chain = u16::from_le_bytes([data[8], data[9]]);
        let mut address = [0u8; 32];
        address.copy_from_slice(&data[10..42]);
        Ok(Self {
            chain,
            address: Address(address),
        })
    }

    pub fn encode(&self, account_name: &str) -> Vec<u8> {
        let mut data = account_discriminator(account_name).to_vec();
        data.extend_from_slice(&self.chain.to_le_bytes());
        data.extend_from_slice(self.address.as_bytes());
        data
    }
}

/// Sequence trackers hold the next sequence as a bare u64.
pub fn parse_sequence_tracker(data: &[u8]) -> Result<u64, RelayError> {
    read_u64_le(data, 0).ok_or_else(|| RelayError::Rpc("sequence tracker shorter than 8 bytes".into()))
}

pub fn parse_bridge_fee(data: &[u8]) -> Result<u64, RelayError> {
    read_u64_le(data, BRIDGE_FEE_OFFSET).ok_or_else(|| RelayError::Rpc("bridge data too short".into()))
}

pub fn parse_token_amount(data: &[u8]) -> Result<u64, RelayError> {
    read_u64_le(data, TOKEN_AMOUNT_OFFSET).ok_or_else(|| RelayError::Rpc("token account too short".into()))
}

/// Sequence the core bridge logged while publishing a message.
///
/// Understands `Sequence: N` and `MessagePublished: ..., sequence=N, ...`.
pub fn parse_sequence_log<S: AsRef<str>>(logs: &[S]) -> Option<u64> {
    logs.iter().find_map(|line| {
        let line = line.as_ref();
        let line = line.strip_prefix("Program log: ").unwrap_or(line);
        if let Some(value) = line.strip_prefix("Sequence: ") {
            return value.trim().parse().ok();
        }
        let fields = line.strip_prefix("MessagePublished: ")?;
        fields
            .split(", ")
            .find_map(|field| field.strip_prefix("sequence="))
            .and_then(|value| value.parse().ok())
    })
}

/// Program logs report `init` on an existing account this way.
pub fn is_duplicate_rejection(message: &str) -> bool {
    message.contains("already in use")
}
