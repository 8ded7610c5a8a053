pub mod fixtures;
pub mod mock_chain;
pub mod vaa_builder;

pub use fixtures::*;
pub use mock_chain::*;
pub use vaa_builder::*;

