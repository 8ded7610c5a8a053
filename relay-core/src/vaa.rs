//! Binary codec for guardian-signed attestations.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! header  version u8 | guardian_set_index u32 | n u8 | n * (guardian_index u8, sig [u8; 65])
//! body    timestamp u32 | nonce u32 | emitter_chain u16 | emitter_address [u8; 32]
//!         | sequence u64 | consistency_level u8 | payload ..
//! ```

use crate::error::{ParseError, RelayError};
use crate::signer::recover_signer;
use crate::types::{Address, ChainId, GuardianSet};
use crate::utils::keccak256;
use serde::{Deserialize, Serialize};

pub const HEADER_LEN: usize = 6;
pub const SIGNATURE_LEN: usize = 66;
pub const BODY_FIXED_LEN: usize = 51;
pub const MAX_SIGNATURES: usize = u8::MAX as usize;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VAA {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: ChainId,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl VAA {
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + SIGNATURE_LEN * self.signatures.len() + BODY_FIXED_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        if self.signatures.len() > MAX_SIGNATURES {
            return Err(ParseError::TooManySignatures(self.signatures.len()));
        }

        let mut bytes = Vec::with_capacity(self.encoded_len());

        bytes.push(self.version);
        bytes.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        bytes.push(self.signatures.len() as u8);

        for sig in &self.signatures {
            bytes.push(sig.guardian_index);
            bytes.extend_from_slice(&sig.to_bytes());
        }

        bytes.extend_from_slice(&self.body());
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(bytes);

        let version = reader.u8()?;
        let guardian_set_index = reader.u32()?;
        let sig_count = reader.u8()? as usize;

        // Fail before allocating if the declared count cannot fit.
        reader.ensure(sig_count * SIGNATURE_LEN + BODY_FIXED_LEN)?;

        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            let guardian_index = reader.u8()?;
            let raw: [u8; 65] = reader.array()?;
            signatures.push(Signature::from_bytes(guardian_index, &raw));
        }

        let timestamp = reader.u32()?;
        let nonce = reader.u32()?;
        let emitter_chain = reader.u16()?;
        let emitter_address = Address(reader.array()?);
        let sequence = reader.u64()?;
        let consistency_level = reader.u8()?;
        let payload = reader.rest().to_vec();

        Ok(VAA {
            version,
            guardian_set_index,
            signatures,
            timestamp,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level,
            payload,
        })
    }

    /// The signed portion of the attestation.
    pub fn body(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(BODY_FIXED_LEN + self.payload.len());
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&self.emitter_chain.to_be_bytes());
        data.extend_from_slice(self.emitter_address.as_bytes());
        data.extend_from_slice(&self.sequence.to_be_bytes());
        data.push(self.consistency_level);
        data.extend_from_slice(&self.payload);
        data
    }

    /// keccak256(body). Keys posted-VAA accounts and EVM replay maps.
    pub fn message_hash(&self) -> [u8; 32] {
        keccak256(&self.body())
    }

    /// keccak256(keccak256(body)), the value guardians sign.
    pub fn digest(&self) -> [u8; 32] {
        keccak256(&self.message_hash())
    }

    /// Checks ordering, quorum and that every signature recovers to its guardian key.
    pub fn verify_signatures(&self, guardian_set: &GuardianSet) -> Result<(), RelayError> {
        if self.guardian_set_index != guardian_set.index {
            return Err(RelayError::Signing(format!(
                "guardian set {} does not match attestation set {}",
                guardian_set.index, self.guardian_set_index
            )));
        }
        if self.signatures.len() < guardian_set.quorum() {
            return Err(RelayError::Signing(format!(
                "{} signatures, quorum is {}",
                self.signatures.len(),
                guardian_set.quorum()
            )));
        }

        let digest = self.digest();
        let mut last_index: Option<u8> = None;
        for sig in &self.signatures {
            if last_index.is_some_and(|last| sig.guardian_index <= last) {
                return Err(RelayError::Signing("guardian indices not strictly ascending".into()));
            }
            last_index = Some(sig.guardian_index);

            let key = guardian_set
                .keys
                .get(sig.guardian_index as usize)
                .ok_or_else(|| RelayError::Signing(format!("invalid guardian index {}", sig.guardian_index)))?;
            let recovered = recover_signer(digest, &sig.to_bytes())?;
            if recovered != *key {
                return Err(RelayError::Signing(format!(
                    "signature {} does not recover to guardian key",
                    sig.guardian_index
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub guardian_index: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    pub fn from_bytes(guardian_index: u8, bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        Signature {
            guardian_index,
            r,
            s,
            v: bytes[64],
        }
    }
}

/// Bounds-checked big-endian cursor. Every read checks the remaining length first.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn ensure(&self, needed: usize) -> Result<(), ParseError> {
        if self.remaining() < needed {
            return Err(ParseError::Truncated {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.ensure(n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ParseError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}
