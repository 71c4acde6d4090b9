//! Relay API Client
//!
//! HTTP client for the execution relay that prices (quotes), relays and
//! reports on supertransactions. Provides methods for requesting a quote,
//! submitting a signed execution and polling per-chain execution status.

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::service::submission::SignedExecution;
use crate::supertransaction::{FeeToken, Supertransaction};

// ============================================================================
// API RESPONSE WRAPPER
// ============================================================================

/// Standardized response structure from the relay API.
///
/// All relay endpoints return this format:
/// ```json
/// {
///   "success": true|false,
///   "data": <payload>|null,
///   "error": <message>|null
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

// ============================================================================
// QUOTE STRUCTURES
// ============================================================================

/// Account address on one chain, sent so the relay knows the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeployment {
    pub chain_id: u64,
    pub address: Address,
}

/// Request body for POST /v1/quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Signer identity that will authorize the supertransaction
    pub owner: Address,
    /// Smart account address on each operation chain
    pub accounts: Vec<AccountDeployment>,
    pub supertransaction: Supertransaction,
}

/// Fee charged on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFee {
    pub chain_id: u64,
    pub amount: U256,
}

/// Total fee in the designated fee token, with a per-chain breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub fee_token: FeeToken,
    pub amount: U256,
    #[serde(default)]
    pub per_chain: Vec<ChainFee>,
}

/// Priced quote returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical digest over the whole supertransaction; this is what is signed
    pub hash: H256,
    pub fee: FeeBreakdown,
    /// The supertransaction the relay priced
    pub supertransaction: Supertransaction,
    /// Relay-defined expiry; opaque to the orchestrator
    #[serde(default)]
    pub expires_at: Option<u64>,
}

// ============================================================================
// EXECUTION STRUCTURES
// ============================================================================

/// Request body for POST /v1/execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub quote_hash: H256,
    /// Execution-mode prefix followed by the 65-byte signature, 0x-hex
    pub signature: String,
}

/// Tracking handle for a submitted supertransaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle {
    pub aggregate_hash: H256,
}

/// Execution status of one chain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainExecutionStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl ChainExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainExecutionStatus::Confirmed | ChainExecutionStatus::Failed)
    }
}

/// Per-chain entry of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainExecution {
    pub chain_id: u64,
    pub status: ChainExecutionStatus,
    #[serde(default)]
    pub tx_hash: Option<H256>,
    /// Failure reason reported by the relay (e.g. revert data)
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response body for GET /v1/status/{hash}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub aggregate_hash: H256,
    pub chains: Vec<ChainExecution>,
}

// ============================================================================
// RELAY API
// ============================================================================

/// Relay operations the orchestrator depends on.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote>;
    async fn execute(&self, execution: &SignedExecution) -> Result<ExecutionHandle>;
    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus>;
}

/// HTTP client for the relay API.
///
/// Transport failures, timeouts and 5xx responses are reported as network
/// errors; a non-success envelope on a 4xx/2xx response is a rejection.
pub struct RelayClient {
    /// Base URL of the relay, e.g. "https://mee-node.biconomy.io"
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl RelayClient {
    /// Create a new relay client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .map_err(|e| {
                OrchestratorError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Sends a request and unwraps the response envelope.
    ///
    /// Returns the HTTP status alongside the envelope so callers can map
    /// endpoint-specific statuses before the envelope is interpreted.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<(StatusCode, ApiResponse<T>)> {
        let http_response = request.send().await.map_err(|e| {
            OrchestratorError::Network(format!("failed to send {} request: {}", endpoint, e))
        })?;

        let status = http_response.status();
        if status.is_server_error() {
            return Err(OrchestratorError::Network(format!(
                "{} returned HTTP {}",
                endpoint, status
            )));
        }

        let body = http_response.text().await.map_err(|e| {
            OrchestratorError::Network(format!("failed to read {} response: {}", endpoint, e))
        })?;

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(envelope) => Ok((status, envelope)),
            Err(e) if status.is_success() => Err(OrchestratorError::Network(format!(
                "failed to parse {} response: {}",
                endpoint, e
            ))),
            Err(_) => Ok((
                status,
                ApiResponse {
                    success: false,
                    data: None,
                    error: Some(body),
                },
            )),
        }
    }
}

fn error_message<T>(response: &ApiResponse<T>) -> String {
    response
        .error
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[async_trait]
impl RelayApi for RelayClient {
    /// Request a quote for a supertransaction.
    ///
    /// Any refusal (e.g. insufficient fee-token balance) is a `QuoteError`.
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let url = format!("{}/v1/quote", self.base_url);
        debug!(
            "Requesting quote for {} operation(s)",
            request.supertransaction.operations().len()
        );

        let (status, response) = self
            .send::<Quote>(self.client.post(&url).json(request), "POST /v1/quote")
            .await?;

        if !response.success {
            let message = error_message(&response);
            warn!("Relay refused quote ({}): {}", status, message);
            return Err(OrchestratorError::Quote(message));
        }

        let quote = response.data.ok_or_else(|| {
            OrchestratorError::Quote("missing data in successful quote response".to_string())
        })?;
        info!("Received quote {:?} (fee {})", quote.hash, quote.fee.amount);
        Ok(quote)
    }

    /// Submit a signed execution.
    ///
    /// HTTP 410 Gone means the quote expired and must be re-requested.
    async fn execute(&self, execution: &SignedExecution) -> Result<ExecutionHandle> {
        let url = format!("{}/v1/execute", self.base_url);
        let body = ExecuteRequest {
            quote_hash: execution.quote_hash(),
            signature: execution.wire_signature(),
        };

        let (status, response) = self
            .send::<ExecutionHandle>(self.client.post(&url).json(&body), "POST /v1/execute")
            .await?;

        if status == StatusCode::GONE {
            return Err(OrchestratorError::QuoteExpired(format!(
                "{:?}",
                execution.quote_hash()
            )));
        }

        if !response.success {
            return Err(OrchestratorError::RelayRejection {
                status: status.as_u16(),
                message: error_message(&response),
            });
        }

        let handle = response.data.ok_or_else(|| OrchestratorError::RelayRejection {
            status: status.as_u16(),
            message: "missing data in successful execute response".to_string(),
        })?;
        info!("Supertransaction submitted: {:?}", handle.aggregate_hash);
        Ok(handle)
    }

    /// Fetch per-chain execution status.
    async fn status(&self, handle: &ExecutionHandle) -> Result<ExecutionStatus> {
        let url = format!("{}/v1/status/{:?}", self.base_url, handle.aggregate_hash);

        let (status, response) = self
            .send::<ExecutionStatus>(self.client.get(&url), "GET /v1/status/:hash")
            .await?;

        if !response.success {
            return Err(OrchestratorError::RelayRejection {
                status: status.as_u16(),
                message: error_message(&response),
            });
        }

        response.data.ok_or_else(|| OrchestratorError::RelayRejection {
            status: status.as_u16(),
            message: "missing data in successful status response".to_string(),
        })
    }
}
