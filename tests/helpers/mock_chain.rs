use async_trait::async_trait;
use relay_core::adapter::{registration_needed, validate_foreign_endpoint, validate_recipient};
use relay_core::payload::{Amount, BridgeMessage, MessengerMessage, TokenTransfer, TransferExtra};
use relay_core::{
    Address, AttestationSource, ChainAdapter, ChainId, DestinationChainAdapter, FetchOutcome, Registration,
    RelayError, SendReceipt, SourceChainAdapter, TransferIntent, TxRef, VAA,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{VAABuilder, TEST_GUARDIAN_KEYS, TEST_QUORUM};

/// Fee every mock send charges.
pub const MOCK_FEE: u128 = 1_000;

#[derive(Clone, Debug)]
pub struct PublishedMessage {
    pub sequence: u64,
    pub payload: Vec<u8>,
    pub tx: TxRef,
}

#[derive(Default)]
struct MockState {
    next_sequence: u64,
    balance: u128,
    published: Vec<PublishedMessage>,
    redeemed: HashSet<(ChainId, Address, u64)>,
    redeem_submissions: usize,
    registrations: HashMap<ChainId, Address>,
    registration_submissions: usize,
    /// Stores a different address than requested, to exercise read-back checks.
    corrupt_registrations: bool,
}

/// In-memory chain implementing both adapter roles.
#[derive(Clone)]
pub struct MockChain {
    chain_id: ChainId,
    emitter: Address,
    state: Arc<RwLock<MockState>>,
}

impl MockChain {
    pub fn new(chain_id: ChainId, emitter: Address) -> Self {
        let state = MockState {
            balance: u128::MAX,
            ..Default::default()
        };
        Self {
            chain_id,
            emitter,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn set_next_sequence(&self, sequence: u64) {
        self.state.write().await.next_sequence = sequence;
    }

    pub async fn set_balance(&self, balance: u128) {
        self.state.write().await.balance = balance;
    }

    pub async fn corrupt_registrations(&self) {
        self.state.write().await.corrupt_registrations = true;
    }

    pub async fn get_published(&self) -> Vec<PublishedMessage> {
        self.state.read().await.published.clone()
    }

    pub async fn get_message(&self, sequence: u64) -> Option<PublishedMessage> {
        self.state
            .read()
            .await
            .published
            .iter()
            .find(|m| m.sequence == sequence)
            .cloned()
    }

    pub async fn redeem_submissions(&self) -> usize {
        self.state.read().await.redeem_submissions
    }

    pub async fn registration_submissions(&self) -> usize {
        self.state.read().await.registration_submissions
    }
}

#[async_trait]
impl ChainAdapter for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn emitter_address(&self) -> Result<Address, RelayError> {
        Ok(self.emitter)
    }

    async fn register_foreign_endpoint(&self, chain: ChainId, address: &Address) -> Result<Registration, RelayError> {
        validate_foreign_endpoint(self.chain_id, chain, address)?;
        if !registration_needed(self.registered_endpoint(chain).await?, address) {
            return Ok(Registration::Unchanged);
        }

        let mut state = self.state.write().await;
        state.registration_submissions += 1;
        let stored = if state.corrupt_registrations {
            Address([0xee; 32])
        } else {
            *address
        };
        state.registrations.insert(chain, stored);
        Ok(Registration::Submitted(TxRef(format!(
            "register-{}-{}",
            self.chain_id, state.registration_submissions
        ))))
    }

    async fn registered_endpoint(&self, chain: ChainId) -> Result<Option<Address>, RelayError> {
        Ok(self.state.read().await.registrations.get(&chain).copied())
    }
}

#[async_trait]
impl SourceChainAdapter for MockChain {
    async fn send(&self, intent: &TransferIntent) -> Result<SendReceipt, RelayError> {
        let payload = match intent {
            TransferIntent::Message { payload } => MessengerMessage::Message {
                payload: payload.clone(),
            }
            .encode()?,
            TransferIntent::Tokens {
                token,
                amount,
                recipient_chain,
                recipient,
                ..
            } => {
                validate_recipient(self.chain_id, *recipient_chain, recipient)?;
                if *amount == 0 {
                    return Err(RelayError::ZeroAmount);
                }
                TokenTransfer {
                    amount: Amount::from_u64(*amount),
                    token_address: *token,
                    token_chain: self.chain_id,
                    recipient: *recipient,
                    recipient_chain: *recipient_chain,
                    extra: TransferExtra::WithPayload {
                        sender: self.emitter,
                        payload: BridgeMessage::Hello { recipient: *recipient }.encode(),
                    },
                }
                .encode()
            }
        };

        let mut state = self.state.write().await;
        if state.balance < MOCK_FEE {
            return Err(RelayError::InsufficientFunds {
                need: MOCK_FEE,
                have: state.balance,
            });
        }
        state.balance -= MOCK_FEE;

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let tx = TxRef(format!("send-{}-{}", self.chain_id, sequence));
        state.published.push(PublishedMessage {
            sequence,
            payload,
            tx: tx.clone(),
        });

        Ok(SendReceipt {
            sequence,
            emitter: self.emitter,
            tx,
        })
    }
}

#[async_trait]
impl DestinationChainAdapter for MockChain {
    async fn is_redeemed(&self, vaa: &VAA) -> Result<bool, RelayError> {
        let key = (vaa.emitter_chain, vaa.emitter_address, vaa.sequence);
        Ok(self.state.read().await.redeemed.contains(&key))
    }

    async fn redeem(&self, vaa: &VAA) -> Result<TxRef, RelayError> {
        if self.is_redeemed(vaa).await? {
            return Err(RelayError::AlreadyRedeemed);
        }
        let mut state = self.state.write().await;
        if !state.redeemed.insert((vaa.emitter_chain, vaa.emitter_address, vaa.sequence)) {
            return Err(RelayError::AlreadyRedeemed);
        }
        state.redeem_submissions += 1;
        Ok(TxRef(format!("redeem-{}-{}", self.chain_id, vaa.sequence)))
    }
}

/// Observes a [`MockChain`] and signs what it published, after `delay_attempts` misses.
pub struct MockGuardians {
    chain: MockChain,
    delay_attempts: usize,
    attempts: AtomicUsize,
}

impl MockGuardians {
    pub fn new(chain: MockChain, delay_attempts: usize) -> Self {
        Self {
            chain,
            delay_attempts,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationSource for MockGuardians {
    async fn fetch(&self, chain: ChainId, emitter: &Address, sequence: u64) -> Result<FetchOutcome, RelayError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.delay_attempts || chain != self.chain.chain_id() || *emitter != self.chain.emitter {
            return Ok(FetchOutcome::NotFound);
        }
        let Some(message) = self.chain.get_message(sequence).await else {
            return Ok(FetchOutcome::NotFound);
        };

        let vaa = VAABuilder::new(chain, *emitter, sequence)
            .with_payload(message.payload)
            .add_signatures_from_keys(&TEST_GUARDIAN_KEYS[..TEST_QUORUM])
            .build();
        Ok(FetchOutcome::Found(vaa.encode()?))
    }
}

/// Replays a fixed list of outcomes, then keeps returning the last one.
pub struct ScriptedSource {
    script: std::sync::Mutex<VecDeque<Result<FetchOutcome, RelayError>>>,
    last: Result<FetchOutcome, RelayError>,
    attempts: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<FetchOutcome, RelayError>>) -> Self {
        let last = script.last().cloned().unwrap_or(Ok(FetchOutcome::NotFound));
        Self {
            script: std::sync::Mutex::new(script.into()),
            last,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn never() -> Self {
        Self::new(vec![Ok(FetchOutcome::NotFound)])
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationSource for ScriptedSource {
    async fn fetch(&self, _chain: ChainId, _emitter: &Address, _sequence: u64) -> Result<FetchOutcome, RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.last.clone())
    }
}

/// A lookup that never answers.
#[derive(Default)]
pub struct StalledSource {
    attempts: AtomicUsize,
}

impl StalledSource {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationSource for StalledSource {
    async fn fetch(&self, _chain: ChainId, _emitter: &Address, _sequence: u64) -> Result<FetchOutcome, RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
