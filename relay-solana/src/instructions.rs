//! Instruction builders for the messenger, the token-bridge integration and
//! the core bridge. Account order follows each program's account structs.

use crate::accounts::{SYSTEM_PROGRAM_ID, SYSVAR_CLOCK_ID, SYSVAR_RENT_ID};
use relay_core::derive::{self, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use relay_core::utils::instruction_discriminator;
use relay_core::{AccountMeta, Address, ChainId, DeriveError, UnsignedTransaction, VAA};

/// Core bridge `PostVAA` instruction index.
const CORE_POST_VAA: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreBridgeAccounts {
    pub program: Address,
    pub bridge: Address,
    pub fee_collector: Address,
}

impl CoreBridgeAccounts {
    pub fn derive(program: Address) -> Result<Self, DeriveError> {
        Ok(Self {
            bridge: derive::core_bridge_address(&program)?,
            fee_collector: derive::fee_collector_address(&program)?,
            program,
        })
    }

    pub fn posted_vaa(&self, vaa: &VAA) -> Result<Address, DeriveError> {
        derive::posted_vaa_address(&self.program, &vaa.message_hash())
    }

    /// Writes the attestation body into its posted-VAA account.
    pub fn post_vaa(&self, chain: ChainId, payer: Address, vaa: &VAA) -> Result<UnsignedTransaction, DeriveError> {
        let mut data = vec![CORE_POST_VAA];
        data.push(vaa.version);
        data.extend_from_slice(&vaa.guardian_set_index.to_le_bytes());
        data.extend_from_slice(&vaa.timestamp.to_le_bytes());
        data.extend_from_slice(&vaa.nonce.to_le_bytes());
        data.extend_from_slice(&vaa.emitter_chain.to_le_bytes());
        data.extend_from_slice(vaa.emitter_address.as_bytes());
        data.extend_from_slice(&vaa.sequence.to_le_bytes());
        data.push(vaa.consistency_level);
        push_bytes(&mut data, &vaa.payload);

        let accounts = vec![
            AccountMeta::readonly(derive::guardian_set_address(&self.program, vaa.guardian_set_index)?),
            AccountMeta::readonly(self.bridge),
            AccountMeta::writable(self.posted_vaa(vaa)?),
            AccountMeta::signer(payer),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ];
        Ok(UnsignedTransaction::new(chain, self.program, data).with_accounts(accounts))
    }
}

/// Resolved accounts of the messenger program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerProgram {
    pub program_id: Address,
    pub config: Address,
    pub emitter: Address,
    pub sequence: Address,
    pub core: CoreBridgeAccounts,
}

impl MessengerProgram {
    pub fn derive(program_id: Address, core_program: Address) -> Result<Self, DeriveError> {
        let emitter = derive::emitter_address(&program_id)?;
        Ok(Self {
            config: derive::config_address(&program_id)?,
            sequence: derive::sequence_tracker_address(&core_program, &emitter)?,
            core: CoreBridgeAccounts::derive(core_program)?,
            emitter,
            program_id,
        })
    }

    /// `message_seed` keys the outbound message account; it is the tracker value plus one.
    pub fn send_message(
        &self,
        chain: ChainId,
        payer: Address,
        payload: &[u8],
        message_seed: u64,
    ) -> Result<UnsignedTransaction, DeriveError> {
        let mut data = instruction_discriminator("send_message").to_vec();
        push_bytes(&mut data, payload);

        let accounts = vec![
            AccountMeta::signer(payer),
            AccountMeta::readonly(self.config),
            AccountMeta::readonly(self.core.program),
            AccountMeta::writable(self.core.bridge),
            AccountMeta::writable(self.core.fee_collector),
            AccountMeta::readonly(self.emitter),
            AccountMeta::writable(self.sequence),
            AccountMeta::writable(derive::sent_message_address(&self.program_id, message_seed)?),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ];
        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }

    pub fn received(&self, vaa: &VAA) -> Result<Address, DeriveError> {
        derive::received_address(&self.program_id, vaa.emitter_chain, vaa.sequence)
    }

    pub fn receive_message(&self, chain: ChainId, payer: Address, vaa: &VAA) -> Result<UnsignedTransaction, DeriveError> {
        let mut data = instruction_discriminator("receive_message").to_vec();
        data.extend_from_slice(&vaa.message_hash());

        let accounts = vec![
            AccountMeta::signer(payer),
            AccountMeta::readonly(self.config),
            AccountMeta::readonly(self.core.program),
            AccountMeta::readonly(self.core.posted_vaa(vaa)?),
            AccountMeta::readonly(derive::foreign_emitter_address(&self.program_id, vaa.emitter_chain)?),
            AccountMeta::writable(self.received(vaa)?),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ];
        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }

    pub fn register_emitter(
        &self,
        chain: ChainId,
        owner: Address,
        foreign_chain: ChainId,
        address: &Address,
    ) -> Result<UnsignedTransaction, DeriveError> {
        let mut data = instruction_discriminator("register_emitter").to_vec();
        data.extend_from_slice(&foreign_chain.to_le_bytes());
        data.extend_from_slice(address.as_bytes());

        let accounts = vec![
            AccountMeta::signer(owner),
            AccountMeta::readonly(self.config),
            AccountMeta::writable(derive::foreign_emitter_address(&self.program_id, foreign_chain)?),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ];
        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransfer {
    pub mint: Address,
    /// Minted by the token bridge, as opposed to a native mint held in custody.
    pub wrapped: bool,
    pub batch_id: u32,
    pub amount: u64,
    pub recipient: Address,
    pub recipient_chain: ChainId,
}

/// Resolved accounts of the token-bridge integration and the token bridge it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBridgeProgram {
    pub program_id: Address,
    pub token_bridge: Address,
    pub sender_config: Address,
    pub redeemer_config: Address,
    pub token_bridge_config: Address,
    pub authority_signer: Address,
    pub custody_signer: Address,
    pub mint_authority: Address,
    pub emitter: Address,
    pub sequence: Address,
    pub core: CoreBridgeAccounts,
}

impl TokenBridgeProgram {
    pub fn derive(program_id: Address, token_bridge: Address, core_program: Address) -> Result<Self, DeriveError> {
        let emitter = derive::emitter_address(&token_bridge)?;
        Ok(Self {
            sender_config: derive::sender_config_address(&program_id)?,
            redeemer_config: derive::redeemer_config_address(&program_id)?,
            token_bridge_config: derive::token_bridge_config_address(&token_bridge)?,
            authority_signer: derive::authority_signer_address(&token_bridge)?,
            custody_signer: derive::custody_signer_address(&token_bridge)?,
            mint_authority: derive::mint_authority_address(&token_bridge)?,
            sequence: derive::sequence_tracker_address(&core_program, &emitter)?,
            core: CoreBridgeAccounts::derive(core_program)?,
            emitter,
            token_bridge,
            program_id,
        })
    }

    pub fn send_tokens_with_payload(
        &self,
        chain: ChainId,
        payer: Address,
        transfer: &OutboundTransfer,
        message_seed: u64,
    ) -> Result<UnsignedTransaction, DeriveError> {
        let name = if transfer.wrapped {
            "send_wrapped_tokens_with_payload"
        } else {
            "send_native_tokens_with_payload"
        };
        let mut data = instruction_discriminator(name).to_vec();
        data.extend_from_slice(&transfer.batch_id.to_le_bytes());
        data.extend_from_slice(&transfer.amount.to_le_bytes());
        data.extend_from_slice(transfer.recipient.as_bytes());
        data.extend_from_slice(&transfer.recipient_chain.to_le_bytes());

        let mut accounts = vec![
            AccountMeta::signer(payer),
            AccountMeta::readonly(self.sender_config),
            AccountMeta::readonly(derive::foreign_contract_address(&self.program_id, transfer.recipient_chain)?),
        ];
        accounts.extend([
            AccountMeta::writable(transfer.mint),
            AccountMeta::writable(derive::associated_token_address(&payer, &transfer.mint)?),
            AccountMeta::writable(derive::tmp_token_address(&self.program_id, &transfer.mint)?),
            AccountMeta::readonly(self.core.program),
            AccountMeta::readonly(self.token_bridge),
            AccountMeta::readonly(self.token_bridge_config),
        ]);
        if transfer.wrapped {
            accounts.push(AccountMeta::readonly(derive::wrapped_meta_address(&self.token_bridge, &transfer.mint)?));
            accounts.push(AccountMeta::readonly(self.authority_signer));
        } else {
            accounts.push(AccountMeta::writable(derive::custody_address(&self.token_bridge, &transfer.mint)?));
            accounts.push(AccountMeta::readonly(self.authority_signer));
            accounts.push(AccountMeta::readonly(self.custody_signer));
        }
        accounts.extend([
            AccountMeta::writable(self.core.bridge),
            AccountMeta::writable(derive::bridged_message_address(&self.program_id, message_seed)?),
            AccountMeta::writable(self.emitter),
            AccountMeta::writable(self.sequence),
            AccountMeta::writable(self.core.fee_collector),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(TOKEN_PROGRAM_ID),
            AccountMeta::readonly(ASSOCIATED_TOKEN_PROGRAM_ID),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ]);

        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }

    /// Token-bridge claim account for `vaa`; its existence means redeemed.
    pub fn claim(&self, vaa: &VAA) -> Result<Address, DeriveError> {
        derive::claim_address(&self.token_bridge, &vaa.emitter_address, vaa.emitter_chain, vaa.sequence)
    }

    /// `mint` is the native mint or the wrapped mint; `wrapped` selects the instruction.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem_transfer_with_payload(
        &self,
        chain: ChainId,
        payer: Address,
        vaa: &VAA,
        mint: Address,
        wrapped: bool,
        recipient: Address,
        foreign_endpoint: Address,
    ) -> Result<UnsignedTransaction, DeriveError> {
        let name = if wrapped {
            "redeem_wrapped_transfer_with_payload"
        } else {
            "redeem_native_transfer_with_payload"
        };
        let mut data = instruction_discriminator(name).to_vec();
        data.extend_from_slice(&vaa.message_hash());

        let mut accounts = vec![
            AccountMeta::signer(payer),
            AccountMeta::writable(derive::associated_token_address(&payer, &mint)?),
            AccountMeta::readonly(self.redeemer_config),
            AccountMeta::readonly(derive::foreign_contract_address(&self.program_id, vaa.emitter_chain)?),
            AccountMeta::writable(mint),
            AccountMeta::writable(derive::associated_token_address(&recipient, &mint)?),
            AccountMeta::writable(recipient),
            AccountMeta::writable(derive::tmp_token_address(&self.program_id, &mint)?),
            AccountMeta::readonly(self.core.program),
            AccountMeta::readonly(self.token_bridge),
            AccountMeta::readonly(self.token_bridge_config),
            AccountMeta::readonly(self.core.posted_vaa(vaa)?),
            AccountMeta::writable(self.claim(vaa)?),
            AccountMeta::readonly(foreign_endpoint),
        ];
        if wrapped {
            accounts.push(AccountMeta::readonly(derive::wrapped_meta_address(&self.token_bridge, &mint)?));
            accounts.push(AccountMeta::readonly(self.mint_authority));
        } else {
            accounts.push(AccountMeta::writable(derive::custody_address(&self.token_bridge, &mint)?));
            accounts.push(AccountMeta::readonly(self.custody_signer));
        }
        accounts.extend([
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(TOKEN_PROGRAM_ID),
            AccountMeta::readonly(ASSOCIATED_TOKEN_PROGRAM_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ]);

        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }

    pub fn register_foreign_contract(
        &self,
        chain: ChainId,
        owner: Address,
        foreign_chain: ChainId,
        address: &Address,
        foreign_token_bridge: &Address,
    ) -> Result<UnsignedTransaction, DeriveError> {
        let mut data = instruction_discriminator("register_foreign_contract").to_vec();
        data.extend_from_slice(&foreign_chain.to_le_bytes());
        data.extend_from_slice(address.as_bytes());

        let accounts = vec![
            AccountMeta::signer(owner),
            AccountMeta::readonly(self.sender_config),
            AccountMeta::writable(derive::foreign_contract_address(&self.program_id, foreign_chain)?),
            AccountMeta::readonly(derive::endpoint_registration_address(
                &self.token_bridge,
                foreign_chain,
                foreign_token_bridge,
            )?),
            AccountMeta::readonly(self.token_bridge),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ];
        Ok(UnsignedTransaction::new(chain, self.program_id, data).with_accounts(accounts))
    }
}

/// Borsh `Vec<u8>`: u32 LE length then bytes.
fn push_bytes(data: &mut Vec<u8>, bytes: &[u8]) {
    data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(bytes);
}
