use relay_core::{Address, ChainId, Secp256k1Signer, Signature, VAA};

pub struct VAABuilder {
    vaa: VAA,
}

impl VAABuilder {
    pub fn new(emitter_chain: ChainId, emitter_address: Address, sequence: u64) -> Self {
        Self {
            vaa: VAA {
                version: 1,
                guardian_set_index: 0,
                signatures: Vec::new(),
                timestamp: 1699276800,
                nonce: 0,
                emitter_chain,
                emitter_address,
                sequence,
                consistency_level: 1,
                payload: Vec::new(),
            },
        }
    }
    
    pub fn with_guardian_set_index(mut self, index: u32) -> Self {
        self.vaa.guardian_set_index = index;
        self
    }
    
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.vaa.payload = payload;
        self
    }
    
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.vaa.nonce = nonce;
        self
    }
    
    /// Signs the body digest; the body must be final before signing.
    pub fn add_signature(mut self, private_key: &str, guardian_index: u8) -> Self {
        let signer = Secp256k1Signer::new(private_key).unwrap();
        let signature = signer.sign_digest(self.vaa.digest()).unwrap();
        self.vaa.signatures.push(Signature::from_bytes(guardian_index, &signature));
        self
    }
    
    pub fn add_signatures_from_keys(mut self, keys: &[&str]) -> Self {
        for (i, key) in keys.iter().enumerate() {
            self = self.add_signature(key, i as u8);
        }
        self
    }
    
    pub fn build(self) -> VAA {
        self.vaa
    }
}

impl Default for VAABuilder {
    fn default() -> Self {
        Self::new(1, super::test_emitter(), 42).with_payload(super::message_payload("hello"))
    }
}
