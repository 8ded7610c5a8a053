//! Typed payloads carried inside attestations.

use crate::error::ParseError;
use crate::types::{Address, ChainId};
use crate::vaa::ByteReader;
use serde::{Deserialize, Serialize};

pub const PAYLOAD_TRANSFER: u8 = 1;
pub const PAYLOAD_TRANSFER_WITH_PAYLOAD: u8 = 3;

/// Token bridges carry at most 8 decimals across chains.
pub const MAX_BRIDGED_DECIMALS: u8 = 8;

pub const MESSAGE_MAX_LENGTH: usize = 1024;

/// 256-bit big-endian amount, as it appears on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Amount(pub [u8; 32]);

impl Amount {
    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    /// `None` if the value does not fit in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|&b| b != 0) {
            return None;
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(word))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TransferExtra {
    /// Type 1: relayer fee.
    Fee(Amount),
    /// Type 3: sending contract and its opaque payload.
    WithPayload { sender: Address, payload: Vec<u8> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Normalized to at most 8 decimals by the sender. Never rescaled here.
    pub amount: Amount,
    pub token_address: Address,
    pub token_chain: ChainId,
    pub recipient: Address,
    pub recipient_chain: ChainId,
    pub extra: TransferExtra,
}

impl TokenTransfer {
    pub fn payload_type(&self) -> u8 {
        match self.extra {
            TransferExtra::Fee(_) => PAYLOAD_TRANSFER,
            TransferExtra::WithPayload { .. } => PAYLOAD_TRANSFER_WITH_PAYLOAD,
        }
    }

    pub fn sender_payload(&self) -> Option<&[u8]> {
        match &self.extra {
            TransferExtra::WithPayload { payload, .. } => Some(payload),
            TransferExtra::Fee(_) => None,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(payload);

        let payload_type = reader.u8()?;
        if payload_type != PAYLOAD_TRANSFER && payload_type != PAYLOAD_TRANSFER_WITH_PAYLOAD {
            return Err(ParseError::UnknownPayloadType(payload_type));
        }

        let amount = Amount(reader.array()?);
        let token_address = Address(reader.array()?);
        let token_chain = reader.u16()?;
        let recipient = Address(reader.array()?);
        let recipient_chain = reader.u16()?;

        let extra = if payload_type == PAYLOAD_TRANSFER {
            let fee = Amount(reader.array()?);
            if reader.remaining() != 0 {
                return Err(ParseError::TrailingBytes(reader.remaining()));
            }
            TransferExtra::Fee(fee)
        } else {
            let sender = Address(reader.array()?);
            TransferExtra::WithPayload {
                sender,
                payload: reader.rest().to_vec(),
            }
        };

        Ok(TokenTransfer {
            amount,
            token_address,
            token_chain,
            recipient,
            recipient_chain,
            extra,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(133 + self.sender_payload().map_or(0, <[u8]>::len));
        bytes.push(self.payload_type());
        bytes.extend_from_slice(&self.amount.0);
        bytes.extend_from_slice(self.token_address.as_bytes());
        bytes.extend_from_slice(&self.token_chain.to_be_bytes());
        bytes.extend_from_slice(self.recipient.as_bytes());
        bytes.extend_from_slice(&self.recipient_chain.to_be_bytes());
        match &self.extra {
            TransferExtra::Fee(fee) => bytes.extend_from_slice(&fee.0),
            TransferExtra::WithPayload { sender, payload } => {
                bytes.extend_from_slice(sender.as_bytes());
                bytes.extend_from_slice(payload);
            }
        }
        bytes
    }
}

/// Messenger program payloads: id 0 announces the program, id 1 carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerMessage {
    Alive { program_id: Address },
    Message { payload: Vec<u8> },
}

impl MessengerMessage {
    const ID_ALIVE: u8 = 0;
    const ID_MESSAGE: u8 = 1;

    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        match self {
            MessengerMessage::Alive { program_id } => {
                let mut out = vec![Self::ID_ALIVE];
                out.extend_from_slice(program_id.as_bytes());
                Ok(out)
            }
            MessengerMessage::Message { payload } => {
                if payload.len() > MESSAGE_MAX_LENGTH {
                    return Err(ParseError::PayloadTooLarge(payload.len()));
                }
                let mut out = Vec::with_capacity(3 + payload.len());
                out.push(Self::ID_MESSAGE);
                out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                out.extend_from_slice(payload);
                Ok(out)
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(bytes);
        match reader.u8()? {
            Self::ID_ALIVE => Ok(MessengerMessage::Alive {
                program_id: Address(reader.array()?),
            }),
            Self::ID_MESSAGE => {
                let length = reader.u16()? as usize;
                if length > MESSAGE_MAX_LENGTH {
                    return Err(ParseError::PayloadTooLarge(length));
                }
                Ok(MessengerMessage::Message {
                    payload: reader.take(length)?.to_vec(),
                })
            }
            other => Err(ParseError::UnknownPayloadType(other)),
        }
    }
}

/// Inner payload the token-bridge integration attaches to type-3 transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMessage {
    Hello { recipient: Address },
}

impl BridgeMessage {
    const ID_HELLO: u8 = 1;

    pub fn encode(&self) -> Vec<u8> {
        let BridgeMessage::Hello { recipient } = self;
        let mut out = Vec::with_capacity(33);
        out.push(Self::ID_HELLO);
        out.extend_from_slice(recipient.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(bytes);
        match reader.u8()? {
            Self::ID_HELLO => Ok(BridgeMessage::Hello {
                recipient: Address(reader.array()?),
            }),
            other => Err(ParseError::UnknownPayloadType(other)),
        }
    }
}

/// Drops precision beyond 8 decimals, as the bridge does before emitting.
pub fn normalize_amount(amount: u64, decimals: u8) -> u64 {
    if decimals <= MAX_BRIDGED_DECIMALS {
        return amount;
    }
    10u64
        .checked_pow((decimals - MAX_BRIDGED_DECIMALS) as u32)
        .map_or(0, |divisor| amount / divisor)
}

pub fn denormalize_amount(amount: u64, decimals: u8) -> u64 {
    if decimals <= MAX_BRIDGED_DECIMALS {
        return amount;
    }
    10u64
        .checked_pow((decimals - MAX_BRIDGED_DECIMALS) as u32)
        .map_or(u64::MAX, |factor| amount.saturating_mul(factor))
}

/// The largest amount not exceeding `amount` that survives normalization unchanged.
pub fn truncate_amount(amount: u64, decimals: u8) -> u64 {
    denormalize_amount(normalize_amount(amount, decimals), decimals)
}
