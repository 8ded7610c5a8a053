use sha2::Sha256;
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Anchor instruction discriminator: first 8 bytes of sha256("global:<name>").
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = sha256(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Left-pads into 32 bytes; longer inputs keep their first 32 bytes.
pub fn to_32_bytes(address: &[u8]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let len = address.len().min(32);
    result[32 - len..].copy_from_slice(&address[..len]);
    result
}

pub fn from_32_bytes(bytes: &[u8; 32]) -> Vec<u8> {
    bytes.iter()
        .skip_while(|&&b| b == 0)
        .copied()
        .collect()
}

pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let slice = data.get(offset..offset + 8)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(slice);
    Some(u64::from_le_bytes(word))
}
