//! Chain Clients Module
//!
//! Static chain registry plus the JSON-RPC client used to read balances from
//! each participating EVM chain.

pub mod evm;
pub mod registry;

// Re-export for convenience
pub use evm::{ChainRpc, EvmRpcClient};
pub use registry::{ChainDescriptor, ChainRegistry};
