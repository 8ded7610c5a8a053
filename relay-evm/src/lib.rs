//! EVM side of the relay: messenger and token-bridge integration contracts.

pub mod abi;
pub mod adapter;
pub mod envelope;
pub mod rpc;

pub use adapter::EvmAdapter;
pub use rpc::{EvmRpc, JsonRpcEvmClient};
