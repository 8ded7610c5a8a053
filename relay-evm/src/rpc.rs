//! EVM JSON-RPC surface used by the adapter.

use async_trait::async_trait;
use relay_core::{RelayError, SignedTransaction, TxRef};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Log {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    /// `0x1` on success, `0x0` on revert.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).map(|s| s != 0).unwrap_or(false),
            None => true,
        }
    }
}

#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// `eth_call` against the latest block; returns the raw return data.
    async fn call(&self, to: &[u8; 20], data: &[u8]) -> Result<Vec<u8>, RelayError>;

    async fn get_balance(&self, address: &[u8; 20]) -> Result<u128, RelayError>;

    async fn gas_price(&self) -> Result<u128, RelayError>;

    /// Next nonce for `address`, counting pending transactions.
    async fn transaction_count(&self, address: &[u8; 20]) -> Result<u64, RelayError>;

    /// The network's EIP-155 chain id.
    async fn chain_id(&self) -> Result<u64, RelayError>;

    async fn estimate_gas(&self, from: &[u8; 20], to: &[u8; 20], data: &[u8], value: u128) -> Result<u64, RelayError>;

    async fn send_raw_transaction(&self, transaction: &SignedTransaction) -> Result<TxRef, RelayError>;

    /// `None` while the transaction is pending.
    async fn get_transaction_receipt(&self, tx: &TxRef) -> Result<Option<TransactionReceipt>, RelayError>;
}

pub struct JsonRpcEvmClient {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl JsonRpcEvmClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RelayError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        debug!(method, url = %self.rpc_url, "evm rpc call");
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
            return Err(RelayError::Rpc(format!("{method}: {message}")));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| RelayError::Rpc(format!("{method}: missing result in response")))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128, RelayError> {
        let result = self.rpc_call(method, params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RelayError::Rpc(format!("{method}: result is not a string")))?;
        parse_quantity(hex)
    }
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a hex quantity such as `0x1bc16d674ec80000`.
pub fn parse_quantity(s: &str) -> Result<u128, RelayError> {
    let digits = s.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| RelayError::Rpc(format!("invalid quantity {s}: {e}")))
}

/// Nodes report a failing simulation as `execution reverted[: reason]`.
pub fn is_execution_revert(message: &str) -> bool {
    message.contains("execution reverted")
}

pub fn parse_data(s: &str) -> Result<Vec<u8>, RelayError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| RelayError::Rpc(format!("invalid hex data: {e}")))
}

#[async_trait]
impl EvmRpc for JsonRpcEvmClient {
    async fn call(&self, to: &[u8; 20], data: &[u8]) -> Result<Vec<u8>, RelayError> {
        let result = self
            .rpc_call("eth_call", json!([{ "to": hex_data(to), "data": hex_data(data) }, "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RelayError::Rpc("eth_call: result is not a string".into()))?;
        parse_data(hex)
    }

    async fn get_balance(&self, address: &[u8; 20]) -> Result<u128, RelayError> {
        self.quantity("eth_getBalance", json!([hex_data(address), "latest"])).await
    }

    async fn gas_price(&self) -> Result<u128, RelayError> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    async fn transaction_count(&self, address: &[u8; 20]) -> Result<u64, RelayError> {
        let count = self
            .quantity("eth_getTransactionCount", json!([hex_data(address), "pending"]))
            .await?;
        u64::try_from(count).map_err(|_| RelayError::Rpc(format!("nonce {count} out of range")))
    }

    async fn chain_id(&self) -> Result<u64, RelayError> {
        let id = self.quantity("eth_chainId", json!([])).await?;
        u64::try_from(id).map_err(|_| RelayError::Rpc(format!("chain id {id} out of range")))
    }

    async fn estimate_gas(&self, from: &[u8; 20], to: &[u8; 20], data: &[u8], value: u128) -> Result<u64, RelayError> {
        let gas = self
            .quantity(
                "eth_estimateGas",
                json!([{
                    "from": hex_data(from),
                    "to": hex_data(to),
                    "data": hex_data(data),
                    "value": format!("0x{value:x}"),
                }]),
            )
            .await?;
        u64::try_from(gas).map_err(|_| RelayError::Rpc(format!("gas estimate {gas} out of range")))
    }

    async fn send_raw_transaction(&self, transaction: &SignedTransaction) -> Result<TxRef, RelayError> {
        let result = self
            .rpc_call("eth_sendRawTransaction", json!([hex_data(transaction.to_bytes())]))
            .await?;
        result
            .as_str()
            .map(|hash| TxRef(hash.to_string()))
            .ok_or_else(|| RelayError::Rpc("eth_sendRawTransaction: hash is not a string".into()))
    }

    async fn get_transaction_receipt(&self, tx: &TxRef) -> Result<Option<TransactionReceipt>, RelayError> {
        let result = self.rpc_call("eth_getTransactionReceipt", json!([tx.0])).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x1bc16d674ec80000").unwrap(), 2_000_000_000_000_000_000);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn execution_reverts() {
        assert!(is_execution_revert("eth_estimateGas: execution reverted: message already consumed"));
        assert!(!is_execution_revert("eth_estimateGas: connection reset"));
    }

    #[test]
    fn receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0xabc",
            "status": "0x0",
            "logs": [],
        }))
        .unwrap();
        assert!(!receipt.succeeded());

        let receipt: TransactionReceipt =
            serde_json::from_value(json!({ "transactionHash": "0xabc", "status": "0x1" })).unwrap();
        assert!(receipt.succeeded());
    }
}
