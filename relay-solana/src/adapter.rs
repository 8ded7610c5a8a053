use crate::accounts::{
    is_duplicate_rejection, parse_bridge_fee, parse_sequence_log, parse_sequence_tracker, parse_token_amount,
    ForeignEndpointAccount, LAMPORTS_PER_SIGNATURE,
};
use crate::envelope::sign_transaction;
use crate::instructions::{CoreBridgeAccounts, MessengerProgram, OutboundTransfer, TokenBridgeProgram};
use crate::rpc::SolanaRpc;
use async_trait::async_trait;
use relay_core::adapter::{registration_needed, validate_foreign_endpoint, validate_recipient};
use relay_core::derive;
use relay_core::payload::{truncate_amount, BridgeMessage, MessengerMessage, TokenTransfer};
use relay_core::{
    Address, ChainAdapter, ChainConfig, ChainId, ChainType, DestinationChainAdapter, ProgramMode, Registration,
    RelayError, SendReceipt, Signer, SourceChainAdapter, TransferIntent, TxRef, UnsignedTransaction, VAA,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Offset of `decimals` in an SPL mint account.
const MINT_DECIMALS_OFFSET: usize = 44;

enum Program {
    Messenger(MessengerProgram),
    TokenBridge(TokenBridgeProgram),
}

pub struct SolanaAdapter {
    chain_id: ChainId,
    program: Program,
    rpc: Arc<dyn SolanaRpc>,
    signer: Arc<dyn Signer>,
    /// Token bridge emitters of foreign chains, needed to register foreign contracts.
    foreign_token_bridges: HashMap<ChainId, Address>,
}

impl SolanaAdapter {
    pub fn new(config: &ChainConfig, rpc: Arc<dyn SolanaRpc>, signer: Arc<dyn Signer>) -> Result<Self, RelayError> {
        if config.chain_type != ChainType::SVM {
            return Err(RelayError::Config(format!("{} is not an SVM chain", config.name)));
        }
        let program_id = Address::from_base58(&config.program_address)?;
        let core = Address::from_base58(&config.core_address)?;

        let program = match config.mode {
            ProgramMode::Messenger => Program::Messenger(MessengerProgram::derive(program_id, core)?),
            ProgramMode::TokenBridge => {
                let token_bridge = config
                    .token_bridge_address
                    .as_deref()
                    .ok_or_else(|| RelayError::Config(format!("{}: token_bridge mode needs token_bridge_address", config.name)))?;
                let token_bridge = Address::from_base58(token_bridge)?;
                Program::TokenBridge(TokenBridgeProgram::derive(program_id, token_bridge, core)?)
            }
        };

        Ok(Self {
            chain_id: config.chain_id,
            program,
            rpc,
            signer,
            foreign_token_bridges: HashMap::new(),
        })
    }

    pub fn with_foreign_token_bridge(mut self, chain: ChainId, emitter: Address) -> Self {
        self.foreign_token_bridges.insert(chain, emitter);
        self
    }

    pub fn payer(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, transaction: UnsignedTransaction) -> Result<TxRef, RelayError> {
        let recent_blockhash = self.rpc.latest_blockhash().await?;
        let signed = sign_transaction(self.signer.as_ref(), transaction, recent_blockhash)?;
        self.rpc.send_transaction(&signed).await
    }

    async fn read_sequence(&self, tracker: &Address) -> Result<u64, RelayError> {
        match self.rpc.get_account_data(tracker).await? {
            Some(data) => parse_sequence_tracker(&data),
            // Created by the core bridge on the emitter's first message.
            None => Ok(0),
        }
    }

    /// Balance must cover the core bridge fee plus signature fees.
    async fn check_lamports(&self, core_bridge: &Address, signatures: u64) -> Result<(), RelayError> {
        let fee = match self.rpc.get_account_data(core_bridge).await? {
            Some(data) => parse_bridge_fee(&data)?,
            None => 0,
        };
        let need = fee + LAMPORTS_PER_SIGNATURE * signatures;
        let have = self.rpc.get_balance(&self.payer()).await?;
        if have < need {
            return Err(RelayError::InsufficientFunds {
                need: need as u128,
                have: have as u128,
            });
        }
        Ok(())
    }

    /// Submits a message-emitting transaction and reads the sequence the chain assigned.
    ///
    /// The sequence comes from the landed transaction's own core bridge log, so
    /// other senders on the same emitter cannot shift it.
    async fn emit(
        &self,
        tracker: &Address,
        build: impl FnOnce(u64) -> Result<UnsignedTransaction, RelayError>,
    ) -> Result<(u64, TxRef), RelayError> {
        // Provisional: a concurrent send on the same emitter can take this value first.
        let provisional = self.read_sequence(tracker).await?;
        let tx = self.submit(build(provisional + 1)?).await?;

        let logs = self.rpc.transaction_logs(&tx).await?;
        let sequence = parse_sequence_log(&logs)
            .ok_or_else(|| RelayError::Rpc(format!("transaction {tx} logged no message sequence")))?;
        if sequence != provisional {
            warn!(
                chain = self.chain_id,
                provisional,
                sequence,
                "sequence moved during submission, using the chain's value"
            );
        }
        Ok((sequence, tx))
    }

    async fn send_message(&self, messenger: &MessengerProgram, payload: &[u8]) -> Result<SendReceipt, RelayError> {
        MessengerMessage::Message { payload: payload.to_vec() }.encode()?;
        self.check_lamports(&messenger.core.bridge, 1).await?;

        let payer = self.payer();
        let (sequence, tx) = self
            .emit(&messenger.sequence, |seed| {
                Ok(messenger.send_message(self.chain_id, payer, payload, seed)?)
            })
            .await?;

        Ok(SendReceipt {
            sequence,
            emitter: messenger.emitter,
            tx,
        })
    }

    async fn send_tokens(
        &self,
        bridge: &TokenBridgeProgram,
        mint: &Address,
        amount: u64,
        recipient_chain: ChainId,
        recipient: &Address,
        batch_id: u32,
    ) -> Result<SendReceipt, RelayError> {
        validate_recipient(self.chain_id, recipient_chain, recipient)?;

        let mint_data = self
            .rpc
            .get_account_data(mint)
            .await?
            .ok_or_else(|| RelayError::Rpc(format!("mint {} not found", mint.to_base58())))?;
        let decimals = *mint_data
            .get(MINT_DECIMALS_OFFSET)
            .ok_or_else(|| RelayError::Rpc("mint account too short".into()))?;

        let truncated = truncate_amount(amount, decimals);
        if truncated == 0 {
            return Err(RelayError::ZeroAmount);
        }
        if truncated != amount {
            info!(amount, truncated, decimals, "amount truncated to 8 decimals");
        }

        let payer = self.payer();
        let source_account = derive::associated_token_address(&payer, mint)?;
        let held = match self.rpc.get_account_data(&source_account).await? {
            Some(data) => parse_token_amount(&data)?,
            None => 0,
        };
        if held < truncated {
            return Err(RelayError::InsufficientFunds {
                need: truncated as u128,
                have: held as u128,
            });
        }
        self.check_lamports(&bridge.core.bridge, 1).await?;

        let wrapped = self
            .rpc
            .account_exists(&derive::wrapped_meta_address(&bridge.token_bridge, mint)?)
            .await?;
        let transfer = OutboundTransfer {
            mint: *mint,
            wrapped,
            batch_id,
            amount: truncated,
            recipient: *recipient,
            recipient_chain,
        };

        let (sequence, tx) = self
            .emit(&bridge.sequence, |seed| {
                Ok(bridge.send_tokens_with_payload(self.chain_id, payer, &transfer, seed)?)
            })
            .await?;

        Ok(SendReceipt {
            sequence,
            emitter: bridge.emitter,
            tx,
        })
    }

    /// Posts the attestation to the core bridge unless it is already there.
    async fn post_vaa(&self, core: &CoreBridgeAccounts, vaa: &VAA) -> Result<(), RelayError> {
        if self.rpc.account_exists(&core.posted_vaa(vaa)?).await? {
            debug!(sequence = vaa.sequence, "attestation already posted");
            return Ok(());
        }
        match self.submit(core.post_vaa(self.chain_id, self.payer(), vaa)?).await {
            Ok(tx) => {
                debug!(sequence = vaa.sequence, %tx, "attestation posted");
                Ok(())
            }
            Err(RelayError::Rpc(msg)) if is_duplicate_rejection(&msg) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn redeem_transfer(&self, bridge: &TokenBridgeProgram, vaa: &VAA) -> Result<UnsignedTransaction, RelayError> {
        let transfer = TokenTransfer::decode(&vaa.payload)?;
        if transfer.recipient_chain != self.chain_id {
            return Err(RelayError::InvalidRecipient(format!(
                "transfer targets chain {}, not {}",
                transfer.recipient_chain, self.chain_id
            )));
        }
        let BridgeMessage::Hello { recipient } = BridgeMessage::decode(transfer.sender_payload().unwrap_or_default())?;

        let wrapped = transfer.token_chain != self.chain_id;
        let mint = if wrapped {
            derive::wrapped_mint_address(&bridge.token_bridge, transfer.token_chain, &transfer.token_address)?
        } else {
            transfer.token_address
        };
        let foreign_endpoint =
            derive::endpoint_registration_address(&bridge.token_bridge, vaa.emitter_chain, &vaa.emitter_address)?;

        Ok(bridge.redeem_transfer_with_payload(
            self.chain_id,
            self.payer(),
            vaa,
            mint,
            wrapped,
            recipient,
            foreign_endpoint,
        )?)
    }

    fn endpoint_account(&self, chain: ChainId) -> Result<Address, RelayError> {
        Ok(match &self.program {
            Program::Messenger(messenger) => derive::foreign_emitter_address(&messenger.program_id, chain)?,
            Program::TokenBridge(bridge) => derive::foreign_contract_address(&bridge.program_id, chain)?,
        })
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn emitter_address(&self) -> Result<Address, RelayError> {
        Ok(match &self.program {
            Program::Messenger(messenger) => messenger.emitter,
            Program::TokenBridge(bridge) => bridge.emitter,
        })
    }

    async fn register_foreign_endpoint(&self, chain: ChainId, address: &Address) -> Result<Registration, RelayError> {
        validate_foreign_endpoint(self.chain_id, chain, address)?;
        if !registration_needed(self.registered_endpoint(chain).await?, address) {
            debug!(chain = self.chain_id, foreign_chain = chain, "endpoint already registered");
            return Ok(Registration::Unchanged);
        }

        let owner = self.payer();
        let transaction = match &self.program {
            Program::Messenger(messenger) => messenger.register_emitter(self.chain_id, owner, chain, address)?,
            Program::TokenBridge(bridge) => {
                let foreign_token_bridge = self.foreign_token_bridges.get(&chain).ok_or_else(|| {
                    RelayError::InvalidForeignEndpoint(format!("no token bridge known for chain {chain}"))
                })?;
                bridge.register_foreign_contract(self.chain_id, owner, chain, address, foreign_token_bridge)?
            }
        };

        match self.submit(transaction).await {
            Ok(tx) => Ok(Registration::Submitted(tx)),
            Err(RelayError::Rpc(msg)) if is_duplicate_rejection(&msg) => {
                debug!(chain = self.chain_id, foreign_chain = chain, "registration rejected as existing");
                Ok(Registration::Unchanged)
            }
            Err(e) => Err(e),
        }
    }

    async fn registered_endpoint(&self, chain: ChainId) -> Result<Option<Address>, RelayError> {
        let account = self.endpoint_account(chain)?;
        let Some(data) = self.rpc.get_account_data(&account).await? else {
            return Ok(None);
        };
        let endpoint = ForeignEndpointAccount::parse(&data)?;
        if endpoint.chain != chain {
            return Err(RelayError::Rpc(format!(
                "endpoint account for chain {chain} records chain {}",
                endpoint.chain
            )));
        }
        Ok(Some(endpoint.address))
    }
}

#[async_trait]
impl SourceChainAdapter for SolanaAdapter {
    async fn send(&self, intent: &TransferIntent) -> Result<SendReceipt, RelayError> {
        match (&self.program, intent) {
            (Program::Messenger(messenger), TransferIntent::Message { payload }) => {
                self.send_message(messenger, payload).await
            }
            (
                Program::TokenBridge(bridge),
                TransferIntent::Tokens {
                    token,
                    amount,
                    recipient_chain,
                    recipient,
                    batch_id,
                },
            ) => {
                self.send_tokens(bridge, token, *amount, *recipient_chain, recipient, *batch_id)
                    .await
            }
            (Program::Messenger(_), _) => Err(RelayError::Config("messenger program cannot send tokens".into())),
            (Program::TokenBridge(_), _) => Err(RelayError::Config("token bridge program cannot send messages".into())),
        }
    }
}

#[async_trait]
impl DestinationChainAdapter for SolanaAdapter {
    async fn is_redeemed(&self, vaa: &VAA) -> Result<bool, RelayError> {
        let record = match &self.program {
            Program::Messenger(messenger) => messenger.received(vaa)?,
            Program::TokenBridge(bridge) => bridge.claim(vaa)?,
        };
        self.rpc.account_exists(&record).await
    }

    async fn redeem(&self, vaa: &VAA) -> Result<TxRef, RelayError> {
        if self.is_redeemed(vaa).await? {
            return Err(RelayError::AlreadyRedeemed);
        }

        let (core, transaction) = match &self.program {
            Program::Messenger(messenger) => {
                MessengerMessage::decode(&vaa.payload)?;
                (&messenger.core, messenger.receive_message(self.chain_id, self.payer(), vaa)?)
            }
            Program::TokenBridge(bridge) => (&bridge.core, self.redeem_transfer(bridge, vaa).await?),
        };

        self.post_vaa(core, vaa).await?;

        match self.submit(transaction).await {
            Ok(tx) => {
                info!(chain = self.chain_id, emitter_chain = vaa.emitter_chain, sequence = vaa.sequence, %tx, "redeemed");
                Ok(tx)
            }
            Err(RelayError::Rpc(msg)) if is_duplicate_rejection(&msg) => Err(RelayError::AlreadyRedeemed),
            Err(e) => Err(e),
        }
    }
}
