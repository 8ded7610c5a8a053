use crate::abi::{self, parse_evm_address, LOG_MESSAGE_PUBLISHED};
use crate::envelope::{sign_legacy, LegacyFields};
use crate::rpc::{is_execution_revert, parse_data, EvmRpc, TransactionReceipt};
use async_trait::async_trait;
use relay_core::adapter::{registration_needed, validate_foreign_endpoint, validate_recipient};
use relay_core::payload::{MessengerMessage, TokenTransfer};
use relay_core::{
    Address, ChainAdapter, ChainConfig, ChainId, ChainType, DestinationChainAdapter, ProgramMode, Registration,
    RelayError, SendReceipt, Signer, SourceChainAdapter, TransactionConfig, TransferIntent, TxRef,
    UnsignedTransaction, VAA,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Revert reasons the contracts use for a replayed attestation.
const DUPLICATE_REDEEM_REASONS: &[&str] = &["already consumed", "already completed", "already redeemed"];
const DUPLICATE_REGISTRATION_REASON: &str = "already registered";

pub fn is_duplicate_redeem(message: &str) -> bool {
    DUPLICATE_REDEEM_REASONS.iter().any(|reason| message.contains(reason))
}

/// Messenger contract or token-bridge integration contract on an EVM chain.
pub struct EvmAdapter {
    chain_id: ChainId,
    mode: ProgramMode,
    core: [u8; 20],
    program: [u8; 20],
    /// The token bridge emits transfers on the integration's behalf.
    token_bridge: Option<[u8; 20]>,
    rpc: Arc<dyn EvmRpc>,
    signer: Arc<dyn Signer>,
    transactions: TransactionConfig,
    evm_chain_id: OnceCell<u64>,
    /// Held from nonce lookup until the node accepts the transaction.
    submission: Mutex<()>,
}

impl EvmAdapter {
    pub fn new(
        config: &ChainConfig,
        transactions: &TransactionConfig,
        rpc: Arc<dyn EvmRpc>,
        signer: Arc<dyn Signer>,
    ) -> Result<Self, RelayError> {
        if config.chain_type != ChainType::EVM {
            return Err(RelayError::Config(format!("{} is not an EVM chain", config.name)));
        }
        let token_bridge = match config.mode {
            ProgramMode::Messenger => None,
            ProgramMode::TokenBridge => {
                let address = config.token_bridge_address.as_deref().ok_or_else(|| {
                    RelayError::Config(format!("{}: token_bridge mode needs token_bridge_address", config.name))
                })?;
                Some(parse_evm_address(address)?)
            }
        };
        signer
            .address()
            .to_evm()
            .ok_or_else(|| RelayError::Signing("signer address is not an EVM address".into()))?;

        Ok(Self {
            chain_id: config.chain_id,
            mode: config.mode,
            core: parse_evm_address(&config.core_address)?,
            program: parse_evm_address(&config.program_address)?,
            token_bridge,
            rpc,
            signer,
            transactions: transactions.clone(),
            evm_chain_id: OnceCell::new(),
            submission: Mutex::new(()),
        })
    }

    fn sender(&self) -> Result<[u8; 20], RelayError> {
        self.signer
            .address()
            .to_evm()
            .ok_or_else(|| RelayError::Signing("signer address is not an EVM address".into()))
    }

    fn token_bridge(&self) -> Result<[u8; 20], RelayError> {
        self.token_bridge
            .ok_or_else(|| RelayError::Config("token bridge address not configured".into()))
    }

    async fn network_id(&self) -> Result<u64, RelayError> {
        self.evm_chain_id.get_or_try_init(|| self.rpc.chain_id()).await.copied()
    }

    async fn message_fee(&self) -> Result<u128, RelayError> {
        let data = self.rpc.call(&self.core, &abi::message_fee()).await?;
        abi::decode_u128(&data, 0)
    }

    /// Pre-flight native balance check, then sign, submit and wait for the receipt.
    ///
    /// A simulation that reverts stops here with the node's revert message; other
    /// estimation failures fall back to the configured gas limit.
    async fn execute(&self, to: [u8; 20], data: Vec<u8>, value: u128) -> Result<TransactionReceipt, RelayError> {
        let from = self.sender()?;
        let gas_limit = match self.rpc.estimate_gas(&from, &to, &data, value).await {
            Ok(estimate) => estimate.saturating_mul(150) / 100,
            Err(RelayError::Rpc(msg)) if is_execution_revert(&msg) => return Err(RelayError::Rpc(msg)),
            Err(e) => {
                debug!(chain = self.chain_id, error = %e, "gas estimation failed, using default limit");
                self.transactions.default_gas_limit
            }
        };
        let gas_price = self.rpc.gas_price().await?;
        let need = value + gas_limit as u128 * gas_price;
        let have = self.rpc.get_balance(&from).await?;
        if have < need {
            return Err(RelayError::InsufficientFunds { need, have });
        }

        let transaction = UnsignedTransaction::new(self.chain_id, Address::from_native(&to), data)
            .with_value(value)
            .with_gas_limit(gas_limit);
        let chain_id = self.network_id().await?;
        let tx = {
            let _submitting = self.submission.lock().await;
            let nonce = self.rpc.transaction_count(&from).await?;
            let signed = sign_legacy(self.signer.as_ref(), transaction, LegacyFields { nonce, gas_price, chain_id })?;
            self.rpc.send_raw_transaction(&signed).await?
        };
        debug!(chain = self.chain_id, %tx, "transaction submitted");

        self.wait_for_receipt(&tx).await
    }

    async fn wait_for_receipt(&self, tx: &TxRef) -> Result<TransactionReceipt, RelayError> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = self.rpc.get_transaction_receipt(tx).await? {
                if !receipt.succeeded() {
                    return Err(RelayError::Rpc(format!("transaction {tx} reverted")));
                }
                return Ok(receipt);
            }
            if started.elapsed() >= self.transactions.confirmation_timeout() {
                return Err(RelayError::Rpc(format!(
                    "transaction {tx} not confirmed within {}s",
                    self.transactions.confirmation_timeout_secs
                )));
            }
            sleep(self.transactions.receipt_poll_interval()).await;
        }
    }

    /// Sequence from the core contract's `LogMessagePublished` event.
    fn sequence_from_receipt(&self, receipt: &TransactionReceipt) -> Result<u64, RelayError> {
        let topic = format!("0x{}", hex::encode(abi::event_topic(LOG_MESSAGE_PUBLISHED)));
        let core = format!("0x{}", hex::encode(self.core));

        let log = receipt
            .logs
            .iter()
            .find(|log| {
                log.address.eq_ignore_ascii_case(&core)
                    && log.topics.first().is_some_and(|t| t.eq_ignore_ascii_case(&topic))
            })
            .ok_or_else(|| {
                RelayError::Rpc(format!(
                    "no LogMessagePublished from core in {}",
                    receipt.transaction_hash
                ))
            })?;

        let sequence = abi::decode_u128(&parse_data(&log.data)?, 0)?;
        u64::try_from(sequence).map_err(|_| RelayError::Rpc(format!("sequence {sequence} exceeds u64")))
    }

    async fn send_message(&self, payload: &[u8]) -> Result<SendReceipt, RelayError> {
        MessengerMessage::Message { payload: payload.to_vec() }.encode()?;
        let fee = self.message_fee().await?;

        let receipt = self.execute(self.program, abi::send_message(payload), fee).await?;
        Ok(SendReceipt {
            sequence: self.sequence_from_receipt(&receipt)?,
            emitter: self.emitter_address()?,
            tx: TxRef(receipt.transaction_hash),
        })
    }

    async fn send_tokens(
        &self,
        token: &Address,
        amount: u64,
        recipient_chain: ChainId,
        recipient: &Address,
        batch_id: u32,
    ) -> Result<SendReceipt, RelayError> {
        validate_recipient(self.chain_id, recipient_chain, recipient)?;
        if amount == 0 {
            return Err(RelayError::ZeroAmount);
        }
        let token = token
            .to_evm()
            .ok_or_else(|| RelayError::Config(format!("token {token} is not an EVM address")))?;
        let owner = self.sender()?;
        let need = amount as u128;

        let balance = abi::decode_u128(&self.rpc.call(&token, &abi::balance_of(&owner)).await?, 0)?;
        if balance < need {
            return Err(RelayError::InsufficientFunds { need, have: balance });
        }
        let approved = abi::decode_u128(&self.rpc.call(&token, &abi::allowance(&owner, &self.program)).await?, 0)?;
        if approved < need {
            return Err(RelayError::InsufficientAllowance { need, approved });
        }

        let fee = self.message_fee().await?;
        let data = abi::send_tokens_with_payload(&token, need, recipient_chain, recipient, batch_id);
        let receipt = self.execute(self.program, data, fee).await?;

        Ok(SendReceipt {
            sequence: self.sequence_from_receipt(&receipt)?,
            emitter: self.emitter_address()?,
            tx: TxRef(receipt.transaction_hash),
        })
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn emitter_address(&self) -> Result<Address, RelayError> {
        Ok(match self.mode {
            ProgramMode::Messenger => Address::from_native(&self.program),
            ProgramMode::TokenBridge => Address::from_native(&self.token_bridge()?),
        })
    }

    fn endpoint_address(&self) -> Result<Address, RelayError> {
        Ok(Address::from_native(&self.program))
    }

    async fn register_foreign_endpoint(&self, chain: ChainId, address: &Address) -> Result<Registration, RelayError> {
        validate_foreign_endpoint(self.chain_id, chain, address)?;
        if !registration_needed(self.registered_endpoint(chain).await?, address) {
            debug!(chain = self.chain_id, foreign_chain = chain, "endpoint already registered");
            return Ok(Registration::Unchanged);
        }

        match self.execute(self.program, abi::register_emitter(chain, address), 0).await {
            Ok(receipt) => Ok(Registration::Submitted(TxRef(receipt.transaction_hash))),
            Err(RelayError::Rpc(msg)) if msg.contains(DUPLICATE_REGISTRATION_REASON) => {
                debug!(chain = self.chain_id, foreign_chain = chain, "registration rejected as existing");
                Ok(Registration::Unchanged)
            }
            Err(e) => Err(e),
        }
    }

    async fn registered_endpoint(&self, chain: ChainId) -> Result<Option<Address>, RelayError> {
        let data = self.rpc.call(&self.program, &abi::get_registered_emitter(chain)).await?;
        let address = Address(abi::decode_word(&data, 0)?);
        Ok((!address.is_zero()).then_some(address))
    }
}

#[async_trait]
impl SourceChainAdapter for EvmAdapter {
    async fn send(&self, intent: &TransferIntent) -> Result<SendReceipt, RelayError> {
        match (self.mode, intent) {
            (ProgramMode::Messenger, TransferIntent::Message { payload }) => self.send_message(payload).await,
            (
                ProgramMode::TokenBridge,
                TransferIntent::Tokens {
                    token,
                    amount,
                    recipient_chain,
                    recipient,
                    batch_id,
                },
            ) => {
                self.send_tokens(token, *amount, *recipient_chain, recipient, *batch_id)
                    .await
            }
            (ProgramMode::Messenger, _) => Err(RelayError::Config("messenger contract cannot send tokens".into())),
            (ProgramMode::TokenBridge, _) => Err(RelayError::Config("token bridge contract cannot send messages".into())),
        }
    }
}

#[async_trait]
impl DestinationChainAdapter for EvmAdapter {
    async fn is_redeemed(&self, vaa: &VAA) -> Result<bool, RelayError> {
        let digest = vaa.digest();
        let data = match self.mode {
            ProgramMode::Messenger => self.rpc.call(&self.program, &abi::is_message_consumed(&digest)).await?,
            ProgramMode::TokenBridge => {
                self.rpc
                    .call(&self.token_bridge()?, &abi::is_transfer_completed(&digest))
                    .await?
            }
        };
        abi::decode_bool(&data)
    }

    async fn redeem(&self, vaa: &VAA) -> Result<TxRef, RelayError> {
        if self.is_redeemed(vaa).await? {
            return Err(RelayError::AlreadyRedeemed);
        }

        let encoded = vaa.encode()?;
        let data = match self.mode {
            ProgramMode::Messenger => {
                MessengerMessage::decode(&vaa.payload)?;
                abi::receive_message(&encoded)
            }
            ProgramMode::TokenBridge => {
                let transfer = TokenTransfer::decode(&vaa.payload)?;
                if transfer.recipient_chain != self.chain_id {
                    return Err(RelayError::InvalidRecipient(format!(
                        "transfer targets chain {}, not {}",
                        transfer.recipient_chain, self.chain_id
                    )));
                }
                abi::redeem_tokens_with_payload(&encoded)
            }
        };

        match self.execute(self.program, data, 0).await {
            Ok(receipt) => {
                let tx = TxRef(receipt.transaction_hash);
                info!(chain = self.chain_id, emitter_chain = vaa.emitter_chain, sequence = vaa.sequence, %tx, "redeemed");
                Ok(tx)
            }
            Err(RelayError::Rpc(msg)) if is_duplicate_redeem(&msg) => Err(RelayError::AlreadyRedeemed),
            Err(e) => {
                // A mined revert carries no reason; another redeemer may have won the race.
                if matches!(self.is_redeemed(vaa).await, Ok(true)) {
                    info!(chain = self.chain_id, sequence = vaa.sequence, error = %e, "redeemed by another submitter");
                    return Err(RelayError::AlreadyRedeemed);
                }
                Err(e)
            }
        }
    }
}
