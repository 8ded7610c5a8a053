//! Solana JSON-RPC surface used by the adapter.

use async_trait::async_trait;
use base64::Engine;
use relay_core::{Address, RelayError, SignedTransaction, TxRef};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

const DEFAULT_CONFIRMATION_POLL: Duration = Duration::from_millis(500);
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Raw account data, or `None` if the account does not exist.
    async fn get_account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, RelayError>;

    /// Lamports held by `address`.
    async fn get_balance(&self, address: &Address) -> Result<u64, RelayError>;

    /// Submits and returns once the transaction has landed at the client's commitment.
    /// Program errors surface as [`RelayError::Rpc`].
    async fn send_transaction(&self, transaction: &SignedTransaction) -> Result<TxRef, RelayError>;

    /// Blockhash a new transaction commits to.
    async fn latest_blockhash(&self) -> Result<[u8; 32], RelayError>;

    /// Program log lines of a landed transaction.
    async fn transaction_logs(&self, signature: &TxRef) -> Result<Vec<String>, RelayError>;

    async fn account_exists(&self, address: &Address) -> Result<bool, RelayError> {
        Ok(self.get_account_data(address).await?.is_some())
    }
}

pub struct JsonRpcSolanaClient {
    client: reqwest::Client,
    rpc_url: String,
    commitment: String,
    confirmation_poll: Duration,
    confirmation_timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct AccountValue {
    data: (String, String),
}

#[derive(Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

fn commitment_rank(level: &str) -> u8 {
    match level {
        "finalized" => 2,
        "confirmed" => 1,
        _ => 0,
    }
}

impl JsonRpcSolanaClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
            commitment: "confirmed".to_string(),
            confirmation_poll: DEFAULT_CONFIRMATION_POLL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_commitment(mut self, commitment: &str) -> Self {
        self.commitment = commitment.to_string();
        self
    }

    pub fn with_confirmation(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.confirmation_poll = poll_interval;
        self.confirmation_timeout = timeout;
        self
    }

    /// Polls `getSignatureStatuses` until the signature reaches the commitment level.
    async fn wait_for_confirmation(&self, signature: &str) -> Result<(), RelayError> {
        let started = Instant::now();
        loop {
            let result = self
                .rpc_call(
                    "getSignatureStatuses",
                    json!([[signature], { "searchTransactionHistory": true }]),
                )
                .await?;
            let statuses: ContextValue<Vec<Option<SignatureStatus>>> = serde_json::from_value(result)?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err.filter(|e| !e.is_null()) {
                    return Err(RelayError::Rpc(format!("transaction {signature} failed: {err}")));
                }
                let reached = status.confirmation_status.as_deref().map(commitment_rank).unwrap_or(0);
                if reached >= commitment_rank(&self.commitment) {
                    return Ok(());
                }
            }

            if started.elapsed() >= self.confirmation_timeout {
                return Err(RelayError::Rpc(format!(
                    "transaction {signature} not {} within {}s",
                    self.commitment,
                    self.confirmation_timeout.as_secs()
                )));
            }
            sleep(self.confirmation_poll).await;
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RelayError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        debug!(method, url = %self.rpc_url, "solana rpc call");
        let response: Value = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let logs = error
                .pointer("/data/logs")
                .and_then(Value::as_array)
                .map(|logs| logs.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("; "))
                .unwrap_or_default();
            return Err(RelayError::Rpc(format!("{method}: {message} {logs}").trim_end().to_string()));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| RelayError::Rpc(format!("{method}: missing result in response")))
    }
}

#[async_trait]
impl SolanaRpc for JsonRpcSolanaClient {
    async fn get_account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, RelayError> {
        let result = self
            .rpc_call(
                "getAccountInfo",
                json!([address.to_base58(), { "encoding": "base64", "commitment": self.commitment }]),
            )
            .await?;
        let account: ContextValue<Option<AccountValue>> = serde_json::from_value(result)?;

        match account.value {
            None => Ok(None),
            Some(AccountValue { data: (encoded, _) }) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| RelayError::Rpc(format!("getAccountInfo: bad base64 data: {e}"))),
        }
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, RelayError> {
        let result = self
            .rpc_call("getBalance", json!([address.to_base58(), { "commitment": self.commitment }]))
            .await?;
        let balance: ContextValue<u64> = serde_json::from_value(result)?;
        Ok(balance.value)
    }

    async fn send_transaction(&self, transaction: &SignedTransaction) -> Result<TxRef, RelayError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(transaction.to_bytes());
        let result = self
            .rpc_call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "preflightCommitment": self.commitment }]),
            )
            .await?;
        let signature = result
            .as_str()
            .ok_or_else(|| RelayError::Rpc("sendTransaction: signature is not a string".into()))?
            .to_string();

        self.wait_for_confirmation(&signature).await?;
        debug!(%signature, commitment = %self.commitment, "transaction landed");
        Ok(TxRef(signature))
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], RelayError> {
        let result = self
            .rpc_call("getLatestBlockhash", json!([{ "commitment": self.commitment }]))
            .await?;
        let latest: ContextValue<BlockhashValue> = serde_json::from_value(result)?;
        Address::from_base58(&latest.value.blockhash)
            .map(Address::to_bytes)
            .map_err(|e| RelayError::Rpc(format!("getLatestBlockhash: {e}")))
    }

    async fn transaction_logs(&self, signature: &TxRef) -> Result<Vec<String>, RelayError> {
        let result = self
            .rpc_call(
                "getTransaction",
                json!([signature.0, {
                    "encoding": "json",
                    "commitment": self.commitment,
                    "maxSupportedTransactionVersion": 0,
                }]),
            )
            .await?;
        let logs = result
            .pointer("/meta/logMessages")
            .and_then(Value::as_array)
            .ok_or_else(|| RelayError::Rpc(format!("getTransaction: no logs for {signature}")))?;
        Ok(logs.iter().filter_map(Value::as_str).map(str::to_string).collect())
    }
}
