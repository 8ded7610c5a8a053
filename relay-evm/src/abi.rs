//! Solidity ABI encoding for the handful of calls the adapter makes.

use relay_core::utils::keccak256;
use relay_core::{Address, ChainId, RelayError};

pub const WORD: usize = 32;

/// `LogMessagePublished(address sender, uint64 sequence, uint32 nonce, bytes payload, uint8 consistencyLevel)`.
pub const LOG_MESSAGE_PUBLISHED: &str = "LogMessagePublished(address,uint64,uint32,bytes,uint8)";

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

fn word_u128(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &[u8; 20]) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address);
    word
}

/// Selector followed by static words.
fn call(signature: &str, words: &[[u8; WORD]]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    for word in words {
        data.extend_from_slice(word);
    }
    data
}

/// Selector followed by a single dynamic `bytes` argument.
fn call_with_bytes(signature: &str, bytes: &[u8]) -> Vec<u8> {
    let mut data = call(signature, &[word_u128(WORD as u128), word_u128(bytes.len() as u128)]);
    data.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    data.resize(data.len() + padding, 0);
    data
}

pub fn send_message(payload: &[u8]) -> Vec<u8> {
    call_with_bytes("sendMessage(bytes)", payload)
}

pub fn receive_message(encoded_vaa: &[u8]) -> Vec<u8> {
    call_with_bytes("receiveMessage(bytes)", encoded_vaa)
}

pub fn redeem_tokens_with_payload(encoded_vaa: &[u8]) -> Vec<u8> {
    call_with_bytes("redeemTokensWithPayload(bytes)", encoded_vaa)
}

pub fn send_tokens_with_payload(
    token: &[u8; 20],
    amount: u128,
    target_chain: ChainId,
    recipient: &Address,
    batch_id: u32,
) -> Vec<u8> {
    call(
        "sendTokensWithPayload(address,uint256,uint16,bytes32,uint32)",
        &[
            word_address(token),
            word_u128(amount),
            word_u128(target_chain as u128),
            recipient.to_bytes(),
            word_u128(batch_id as u128),
        ],
    )
}

pub fn register_emitter(chain: ChainId, emitter: &Address) -> Vec<u8> {
    call(
        "registerEmitter(uint16,bytes32)",
        &[word_u128(chain as u128), emitter.to_bytes()],
    )
}

pub fn get_registered_emitter(chain: ChainId) -> Vec<u8> {
    call("getRegisteredEmitter(uint16)", &[word_u128(chain as u128)])
}

pub fn message_fee() -> Vec<u8> {
    call("messageFee()", &[])
}

pub fn is_transfer_completed(hash: &[u8; 32]) -> Vec<u8> {
    call("isTransferCompleted(bytes32)", &[*hash])
}

pub fn is_message_consumed(hash: &[u8; 32]) -> Vec<u8> {
    call("isMessageConsumed(bytes32)", &[*hash])
}

pub fn balance_of(owner: &[u8; 20]) -> Vec<u8> {
    call("balanceOf(address)", &[word_address(owner)])
}

pub fn allowance(owner: &[u8; 20], spender: &[u8; 20]) -> Vec<u8> {
    call("allowance(address,address)", &[word_address(owner), word_address(spender)])
}

pub fn decode_word(data: &[u8], index: usize) -> Result<[u8; WORD], RelayError> {
    let start = index * WORD;
    data.get(start..start + WORD)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| RelayError::Rpc(format!("return data has no word {index} ({} bytes)", data.len())))
}

/// Reads a uint256 that must fit in 128 bits.
pub fn decode_u128(data: &[u8], index: usize) -> Result<u128, RelayError> {
    let word = decode_word(data, index)?;
    if word[..16].iter().any(|&b| b != 0) {
        return Err(RelayError::Rpc(format!("word {index} exceeds u128")));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

pub fn decode_bool(data: &[u8]) -> Result<bool, RelayError> {
    Ok(decode_u128(data, 0)? != 0)
}

/// Parses `0x`-prefixed 20-byte hex.
pub fn parse_evm_address(s: &str) -> Result<[u8; 20], RelayError> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| RelayError::Config(format!("invalid EVM address {s}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| RelayError::Config(format!("EVM address {s} is not 20 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
        assert_eq!(
            hex::encode(event_topic(LOG_MESSAGE_PUBLISHED)),
            "6eb224fb001ed210e379b335e35efe88672a8ce935d981a6896b27ffdf52a3b2"
        );
    }

    #[test]
    fn dynamic_bytes_are_padded() {
        let data = send_message(b"hello");
        assert_eq!(data.len(), 4 + 32 + 32 + 32);
        assert_eq!(decode_u128(&data[4..], 0).unwrap(), 32);
        assert_eq!(decode_u128(&data[4..], 1).unwrap(), 5);
        assert_eq!(&data[68..73], b"hello");
        assert!(data[73..].iter().all(|&b| b == 0));

        assert_eq!(receive_message(&[0u8; 64]).len(), 4 + 64 + 64);
    }

    #[test]
    fn static_arguments() {
        let token = [0xaa; 20];
        let recipient = Address([0xbb; 32]);
        let data = send_tokens_with_payload(&token, 1_000, 1, &recipient, 7);
        let args = &data[4..];
        assert_eq!(decode_word(args, 0).unwrap(), Address::from_native(&token).to_bytes());
        assert_eq!(decode_u128(args, 1).unwrap(), 1_000);
        assert_eq!(decode_u128(args, 2).unwrap(), 1);
        assert_eq!(decode_word(args, 3).unwrap(), recipient.to_bytes());
        assert_eq!(decode_u128(args, 4).unwrap(), 7);
        assert!(decode_word(args, 5).is_err());
    }

    #[test]
    fn evm_addresses() {
        let address = parse_evm_address("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        assert_eq!(address[0], 0x5f);
        assert!(parse_evm_address("0x1234").is_err());
    }
}
