//! Solana side of the relay: the messenger and token-bridge integration programs.

pub mod accounts;
pub mod adapter;
pub mod envelope;
pub mod instructions;
pub mod rpc;

pub use adapter::SolanaAdapter;
pub use rpc::{JsonRpcSolanaClient, SolanaRpc};
