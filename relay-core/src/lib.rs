pub mod adapter;
pub mod api;
pub mod config;
pub mod derive;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod poller;
pub mod registration;
pub mod signer;
pub mod storage;
pub mod types;
pub mod utils;
pub mod vaa;

pub use adapter::*;
pub use config::*;
pub use error::*;
pub use orchestrator::*;
pub use poller::*;
pub use signer::*;
pub use storage::*;
pub use types::*;
pub use vaa::*;
