use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use relay_core::registration::register_pair;
use relay_core::{
    find_chain, Address, AttestationPoller, AttestationStore, ChainAdapter, ChainConfig, ChainId, ChainType,
    DestinationChainAdapter, Ed25519Signer, HttpAttestationSource, ProgramMode, Relay, RelayConfig, RelayError,
    RelayState, Secp256k1Signer, Signer, SourceChainAdapter, TransferIntent, VAA,
};
use relay_evm::{EvmAdapter, JsonRpcEvmClient};
use relay_solana::{JsonRpcSolanaClient, SolanaAdapter};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xchain-relay", about = "Move messages and token transfers between chains via guardian attestations")]
struct Cli {
    /// Relay configuration file.
    #[arg(long, short, default_value = "relay.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the emitter and endpoint addresses of a chain's program.
    Emitter {
        #[arg(long)]
        chain: ChainId,
    },
    /// Register two chains' endpoints with each other and verify both.
    Register {
        #[arg(long)]
        local: ChainId,
        #[arg(long)]
        remote: ChainId,
    },
    /// Send a message and print its sequence.
    SendMessage(MessageArgs),
    /// Send a token transfer and print its sequence.
    SendTokens(TokenArgs),
    /// Wait for an attestation and print it as base64.
    Wait {
        #[arg(long)]
        chain: ChainId,
        /// Emitter address, 0x-hex or base58.
        #[arg(long)]
        emitter: String,
        #[arg(long)]
        sequence: u64,
    },
    /// Redeem a base64 attestation on a destination chain.
    Redeem {
        #[arg(long)]
        chain: ChainId,
        #[arg(long)]
        vaa: String,
    },
    /// Send, wait for the attestation and redeem in one go.
    Relay(RelayArgs),
    /// Serve attestations from files over the lookup API.
    Serve {
        /// Files each holding one base64 attestation.
        #[arg(long)]
        load: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct MessageArgs {
    #[arg(long)]
    from: ChainId,
    /// UTF-8 text, or 0x-hex for raw bytes.
    #[arg(long)]
    payload: String,
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long)]
    from: ChainId,
    #[arg(long)]
    to: ChainId,
    /// Mint or ERC-20 contract.
    #[arg(long)]
    token: String,
    /// Amount in the token's native decimals.
    #[arg(long)]
    amount: u64,
    #[arg(long)]
    recipient: String,
    #[arg(long, default_value_t = 0)]
    batch_id: u32,
}

#[derive(Args)]
struct RelayArgs {
    #[arg(long)]
    from: ChainId,
    #[arg(long)]
    to: ChainId,
    #[arg(long, conflicts_with = "token")]
    payload: Option<String>,
    #[arg(long, requires_all = ["amount", "recipient"])]
    token: Option<String>,
    #[arg(long)]
    amount: Option<u64>,
    #[arg(long)]
    recipient: Option<String>,
    #[arg(long, default_value_t = 0)]
    batch_id: u32,
}

/// A configured chain, usable on either side of a transfer.
#[derive(Clone)]
enum Endpoint {
    Solana(Arc<SolanaAdapter>),
    Evm(Arc<EvmAdapter>),
}

impl Endpoint {
    fn adapter(&self) -> &dyn ChainAdapter {
        match self {
            Endpoint::Solana(adapter) => adapter.as_ref(),
            Endpoint::Evm(adapter) => adapter.as_ref(),
        }
    }

    fn source(&self) -> Arc<dyn SourceChainAdapter> {
        match self {
            Endpoint::Solana(adapter) => adapter.clone(),
            Endpoint::Evm(adapter) => adapter.clone(),
        }
    }

    fn destination(&self) -> Arc<dyn DestinationChainAdapter> {
        match self {
            Endpoint::Solana(adapter) => adapter.clone(),
            Endpoint::Evm(adapter) => adapter.clone(),
        }
    }
}

struct Session {
    config: RelayConfig,
    chains: Vec<ChainConfig>,
}

impl Session {
    fn endpoint(&self, chain_id: ChainId) -> Result<Endpoint> {
        let chain = find_chain(&self.chains, chain_id)?;
        if !chain.enabled {
            bail!("chain {} ({}) is disabled", chain.name, chain.chain_id);
        }

        Ok(match chain.chain_type {
            ChainType::SVM => {
                let signer: Arc<dyn Signer> = Arc::new(self.solana_signer()?);
                let transactions = &self.config.transactions;
                let rpc = Arc::new(
                    JsonRpcSolanaClient::new(&chain.rpc_url)
                        .with_confirmation(transactions.receipt_poll_interval(), transactions.confirmation_timeout()),
                );
                let mut adapter = SolanaAdapter::new(chain, rpc, signer)?;
                if chain.mode == ProgramMode::TokenBridge {
                    for foreign in self.chains.iter().filter(|c| c.chain_type == ChainType::EVM) {
                        if let Some(token_bridge) = &foreign.token_bridge_address {
                            adapter = adapter.with_foreign_token_bridge(foreign.chain_id, Address::from_hex(token_bridge)?);
                        }
                    }
                }
                Endpoint::Solana(Arc::new(adapter))
            }
            ChainType::EVM => {
                let signer: Arc<dyn Signer> = Arc::new(self.evm_signer()?);
                let rpc = Arc::new(JsonRpcEvmClient::new(&chain.rpc_url));
                Endpoint::Evm(Arc::new(EvmAdapter::new(chain, &self.config.transactions, rpc, signer)?))
            }
        })
    }

    fn evm_signer(&self) -> Result<Secp256k1Signer> {
        let path = self
            .config
            .keys
            .evm_private_key_file
            .as_deref()
            .context("keys.evm_private_key_file is not set")?;
        let key = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        Ok(Secp256k1Signer::new(key.trim())?)
    }

    fn solana_signer(&self) -> Result<Ed25519Signer> {
        let path = self
            .config
            .keys
            .solana_keypair_file
            .as_deref()
            .context("keys.solana_keypair_file is not set")?;
        let keypair = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        Ok(Ed25519Signer::from_keypair_json(&keypair)?)
    }

    fn poller(&self) -> Arc<AttestationPoller> {
        let source = Arc::new(HttpAttestationSource::new(&self.config.attestation.base_url));
        Arc::new(AttestationPoller::from_config(source, &self.config.attestation))
    }
}

fn parse_address(s: &str) -> Result<Address, RelayError> {
    if s.starts_with("0x") {
        Address::from_hex(s)
    } else {
        Address::from_base58(s)
    }
}

fn parse_payload(s: &str) -> Result<Vec<u8>> {
    match s.strip_prefix("0x") {
        Some(digits) => hex::decode(digits).context("payload is not valid hex"),
        None => Ok(s.as_bytes().to_vec()),
    }
}

fn decode_vaa(encoded: &str) -> Result<VAA> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("attestation is not valid base64")?;
    Ok(VAA::decode(&bytes)?)
}

fn encode_vaa(vaa: &VAA) -> Result<String> {
    Ok(base64::engine::general_purpose::STANDARD.encode(vaa.encode()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.to_string_lossy().into_owned();
    let (config, chains) = RelayConfig::load_from_file(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.monitoring.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = %path, chains = chains.len(), "relay client starting");

    let ctx = Session { config, chains };

    match cli.command {
        Commands::Emitter { chain } => {
            let endpoint = ctx.endpoint(chain)?;
            let adapter = endpoint.adapter();
            println!("emitter:  {}", adapter.emitter_address()?);
            println!("endpoint: {}", adapter.endpoint_address()?);
        }
        Commands::Register { local, remote } => {
            let local = ctx.endpoint(local)?;
            let remote = ctx.endpoint(remote)?;
            let remote_address = remote.adapter().endpoint_address()?;
            let outcome = register_pair(
                local.adapter(),
                remote.adapter(),
                remote.adapter().chain_id(),
                &remote_address,
            )
            .await?;
            println!("local:  {:?}", outcome.local);
            println!("remote: {:?}", outcome.remote);
        }
        Commands::SendMessage(args) => {
            let intent = TransferIntent::Message {
                payload: parse_payload(&args.payload)?,
            };
            let receipt = ctx.endpoint(args.from)?.source().send(&intent).await?;
            println!("sequence: {}", receipt.sequence);
            println!("emitter:  {}", receipt.emitter);
            println!("tx:       {}", receipt.tx);
        }
        Commands::SendTokens(args) => {
            let intent = TransferIntent::Tokens {
                token: parse_address(&args.token)?,
                amount: args.amount,
                recipient_chain: args.to,
                recipient: parse_address(&args.recipient)?,
                batch_id: args.batch_id,
            };
            let receipt = ctx.endpoint(args.from)?.source().send(&intent).await?;
            println!("sequence: {}", receipt.sequence);
            println!("emitter:  {}", receipt.emitter);
            println!("tx:       {}", receipt.tx);
        }
        Commands::Wait { chain, emitter, sequence } => {
            let vaa = ctx
                .poller()
                .await_attestation(chain, &parse_address(&emitter)?, sequence)
                .await?;
            println!("{}", encode_vaa(&vaa)?);
        }
        Commands::Redeem { chain, vaa } => {
            let vaa = decode_vaa(&vaa)?;
            match ctx.endpoint(chain)?.destination().redeem(&vaa).await {
                Ok(tx) => println!("redeemed: {tx}"),
                Err(RelayError::AlreadyRedeemed) => println!("already redeemed"),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Relay(args) => {
            let intent = match (args.payload, args.token) {
                (Some(payload), None) => TransferIntent::Message {
                    payload: parse_payload(&payload)?,
                },
                (None, Some(token)) => TransferIntent::Tokens {
                    token: parse_address(&token)?,
                    amount: args.amount.context("--amount is required with --token")?,
                    recipient_chain: args.to,
                    recipient: parse_address(args.recipient.as_deref().context("--recipient is required with --token")?)?,
                    batch_id: args.batch_id,
                },
                _ => bail!("pass either --payload or --token"),
            };

            let source = ctx.endpoint(args.from)?.source();
            let destination = ctx.endpoint(args.to)?.destination();
            let mut relay = Relay::new(source, destination, ctx.poller());

            match relay.run(&intent).await {
                Ok(receipt) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "sequence": receipt.sequence,
                            "emitter": receipt.emitter.to_hex(),
                            "sourceTx": receipt.source_tx.map(|tx| tx.0),
                            "redeemTx": receipt.redeem_tx.map(|tx| tx.0),
                        })
                    );
                }
                Err(e) => {
                    if let RelayState::Failed(_) = relay.state() {
                        let steps: Vec<_> = relay.history().iter().map(RelayState::name).collect();
                        eprintln!("relay failed after {}", steps.join(" -> "));
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Serve { load } => {
            let store = AttestationStore::new();
            for file in &load {
                let encoded = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
                store.store_vaa(&decode_vaa(&encoded)?).await?;
            }
            info!(attestations = store.len().await, "serving attestations");
            relay_core::api::serve(store, &ctx.config.api.host, ctx.config.api.port).await?;
        }
    }

    Ok(())
}
