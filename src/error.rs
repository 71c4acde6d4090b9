//! Orchestrator error taxonomy
//!
//! Every fallible operation in the library returns [`OrchestratorError`].
//! Errors are grouped into coarse [`ErrorKind`]s so the orchestrator can decide
//! between retrying (network), surfacing (relay, partial execution) and failing
//! fast (configuration, validation).

use ethereum_types::H256;
use thiserror::Error;

use crate::service::submission::Submission;
use crate::service::tracker::ExecutionReport;

/// Coarse classification used for retry and propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing chain/token/factory entries. Fatal, raised at construction.
    Configuration,
    /// RPC or relay unreachable, timed out, or returned a server error.
    Network,
    /// Request rejected locally before any network call.
    Validation,
    /// Relay refused a quote or an execution.
    Relay,
    /// Some chain operations failed after submission.
    PartialExecution,
    /// A signed execution is held but the relay has not accepted it yet.
    /// Resume the returned submission rather than starting over.
    Pending,
    /// The relay never reported a final status within the poll budget.
    Timeout,
    /// Signer failed to produce a signature.
    Signing,
    /// Submission state machine driven out of order.
    State,
    /// Integer overflow while folding balances.
    Arithmetic,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no factory deployment configured for chain {0}")]
    UnsupportedChain(u64),
    #[error("token {token} has no mapping on chain {chain_id}")]
    UnknownMapping { token: String, chain_id: u64 },
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid amount on chain {chain_id}: amount must be greater than zero")]
    InvalidAmount { chain_id: u64 },
    #[error("chain {0} appears in more than one operation")]
    DuplicateChain(u64),
    #[error("fee token chain {0} is not among the operation chains")]
    FeeChainNotIncluded(u64),
    #[error("validation error: {0}")]
    Validation(String),

    #[error("quote error: {0}")]
    Quote(String),
    #[error("relay rejected request ({status}): {message}")]
    RelayRejection { status: u16, message: String },
    #[error("quote {0} expired before execution")]
    QuoteExpired(String),

    #[error("partial execution failure: {}", .0.summary())]
    PartialExecutionFailure(Box<ExecutionReport>),

    #[error("signed execution not accepted by the relay: {source}")]
    ExecutionPending {
        submission: Box<Submission>,
        source: Box<OrchestratorError>,
    },

    #[error("supertransaction {aggregate_hash:?} not final after {polls} status polls")]
    TrackingTimeout { aggregate_hash: H256, polls: u32 },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid submission state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("balance overflow while summing {0}")]
    BalanceOverflow(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::UnsupportedChain(_)
            | OrchestratorError::UnknownMapping { .. }
            | OrchestratorError::Configuration(_) => ErrorKind::Configuration,
            OrchestratorError::Network(_) => ErrorKind::Network,
            OrchestratorError::InvalidAmount { .. }
            | OrchestratorError::DuplicateChain(_)
            | OrchestratorError::FeeChainNotIncluded(_)
            | OrchestratorError::Validation(_) => ErrorKind::Validation,
            OrchestratorError::Quote(_)
            | OrchestratorError::RelayRejection { .. }
            | OrchestratorError::QuoteExpired(_) => ErrorKind::Relay,
            OrchestratorError::PartialExecutionFailure(_) => ErrorKind::PartialExecution,
            OrchestratorError::ExecutionPending { .. } => ErrorKind::Pending,
            OrchestratorError::TrackingTimeout { .. } => ErrorKind::Timeout,
            OrchestratorError::Signing(_) => ErrorKind::Signing,
            OrchestratorError::InvalidState { .. } => ErrorKind::State,
            OrchestratorError::BalanceOverflow(_) => ErrorKind::Arithmetic,
        }
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Takes the still-signed submission out of an `ExecutionPending` error.
    pub fn into_pending(self) -> Option<Submission> {
        match self {
            OrchestratorError::ExecutionPending { submission, .. } => Some(*submission),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
