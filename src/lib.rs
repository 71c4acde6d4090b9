//! Orchestrator library for multichain smart accounts
//!
//! Derives one counterfactual smart account per chain for a single signer,
//! aggregates token balances across chains, and submits cross-chain
//! supertransactions authorized by one signature through an execution relay.

pub mod abi;
pub mod account;
pub mod balance;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod operation;
pub mod relay_client;
pub mod service;
pub mod supertransaction;
pub mod tokens;
pub mod units;

// Re-export public types for convenience
pub use account::{derive_address, FactoryConfig, FactoryDeployment, MultichainAccount};
pub use balance::{BalanceAggregator, NativeBalance, UnifiedBalance};
pub use chains::{ChainDescriptor, ChainRegistry, ChainRpc, EvmRpcClient};
pub use config::OrchestratorConfig;
pub use crypto::{LocalSigner, Signer};
pub use error::{ErrorKind, OrchestratorError, Result};
pub use operation::{Call, CallIntent, CallTarget, ChainOperation, FunctionIntent, OperationBuilder};
pub use relay_client::{
    ApiResponse, ChainExecution, ChainExecutionStatus, ExecutionHandle, ExecutionStatus, Quote,
    QuoteRequest, RelayApi, RelayClient,
};
pub use service::{
    AccountView, ExecutionMode, ExecutionOutcome, ExecutionReport, Orchestrator, RetryPolicy,
    Submission, SubmissionState, TransferRequest,
};
pub use supertransaction::{assemble, FeeToken, Supertransaction};
pub use tokens::{TokenMapping, TokenMappingTable};
pub use units::{format_units, parse_units};
