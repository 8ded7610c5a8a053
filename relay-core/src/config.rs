use crate::error::RelayError;
use crate::types::{ChainConfig, ChainId, ChainType, ProgramMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RelayConfig {
    pub attestation: AttestationConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AttestationConfig {
    pub base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl AttestationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Paths to key material. Keys are read by the binary, never by library code.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct KeyConfig {
    /// File holding a hex secp256k1 key.
    pub evm_private_key_file: Option<String>,
    /// JSON byte-array keypair file.
    pub solana_keypair_file: Option<String>,
}

/// Local attestation service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7071,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransactionConfig {
    pub receipt_poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
    /// Used when gas estimation fails.
    pub default_gas_limit: u64,
}

impl TransactionConfig {
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval_ms: 2000,
            confirmation_timeout_secs: 120,
            default_gas_limit: 300_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_deadline_secs() -> u64 {
    180
}

#[derive(Serialize, Deserialize, Debug)]
struct ConfigFile {
    relay: RelayConfig,
    #[serde(default)]
    chains: HashMap<String, HashMap<String, ChainConfig>>,
}

impl RelayConfig {
    pub fn load_from_file(path: &str) -> Result<(Self, Vec<ChainConfig>), RelayError> {
        let content = fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<(Self, Vec<ChainConfig>), RelayError> {
        let config: ConfigFile = toml::from_str(content).map_err(|e| RelayError::Config(e.to_string()))?;

        let mut chains = Vec::new();
        for (family, chain_type) in [("evm", ChainType::EVM), ("svm", ChainType::SVM)] {
            if let Some(family_chains) = config.chains.get(family) {
                for chain in family_chains.values() {
                    if chain.chain_type != chain_type {
                        return Err(RelayError::Config(format!(
                            "chain {} listed under {family} but typed {:?}",
                            chain.name, chain.chain_type
                        )));
                    }
                    chains.push(chain.clone());
                }
            }
        }
        chains.sort_by_key(|c| c.chain_id);

        if let Some(pair) = chains.windows(2).find(|w| w[0].chain_id == w[1].chain_id) {
            return Err(RelayError::Config(format!("chain id {} configured twice", pair[0].chain_id)));
        }

        Ok((config.relay, chains))
    }

    pub fn default_test_config() -> Self {
        Self {
            attestation: AttestationConfig {
                base_url: "http://127.0.0.1:7071".to_string(),
                poll_interval_secs: default_poll_interval_secs(),
                deadline_secs: default_deadline_secs(),
            },
            keys: KeyConfig::default(),
            api: ApiConfig::default(),
            transactions: TransactionConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

/// Looks up an enabled chain by id.
pub fn find_chain(chains: &[ChainConfig], chain_id: ChainId) -> Result<&ChainConfig, RelayError> {
    chains
        .iter()
        .find(|c| c.chain_id == chain_id && c.enabled)
        .ok_or_else(|| RelayError::Config(format!("no enabled chain with id {chain_id}")))
}

pub fn create_test_chain_config(chain_id: ChainId, chain_type: ChainType) -> ChainConfig {
    let (name, rpc_url, core_address, program_address) = match (chain_id, chain_type) {
        (1, ChainType::SVM) => (
            "Solana".to_string(),
            "http://localhost:8899".to_string(),
            "3u8hJUVTA4jH1wYAyUur7FFZVQ8H635K3tSHHF4ssjQ5".to_string(),
            "Scaffo1dingHe11oWor1dMessengerProgram111111".to_string(),
        ),
        (2, ChainType::EVM) => (
            "Ethereum".to_string(),
            "http://localhost:8545".to_string(),
            "0x98f3c9e6E3fAce36bAAd05FE09d375Ef1464288B".to_string(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
        ),
        (30, ChainType::EVM) => (
            "Base".to_string(),
            "http://localhost:8546".to_string(),
            "0x79A1027a6A159502049F10906D333EC57E95F083".to_string(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
        ),
        _ => (
            format!("TestChain{}", chain_id),
            "http://localhost:8545".to_string(),
            "0x0000000000000000000000000000000000000000".to_string(),
            "0x0000000000000000000000000000000000000000".to_string(),
        ),
    };

    ChainConfig {
        chain_id,
        chain_type,
        name,
        rpc_url,
        core_address,
        program_address,
        token_bridge_address: None,
        mode: ProgramMode::Messenger,
        enabled: true,
    }
}
