//! EVM Chain RPC Client
//!
//! JSON-RPC client used to read native balances and call view functions
//! (`eth_getBalance`, `eth_call`) on one EVM chain. The [`ChainRpc`] trait is
//! the seam the balance aggregator depends on, so tests can substitute
//! in-memory chains.

use async_trait::async_trait;
use ethereum_types::{Address, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::chains::registry::ChainDescriptor;
use crate::error::{OrchestratorError, Result};

/// Read access to one chain. Implementations must allow concurrent calls.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Native currency balance of `address` at the latest block.
    async fn get_native_balance(&self, address: Address) -> Result<U256>;

    /// Executes a read-only call and returns the raw return data.
    async fn read_contract(&self, contract: Address, calldata: &[u8]) -> Result<Vec<u8>>;
}

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Client for one EVM chain's JSON-RPC endpoint
pub struct EvmRpcClient {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// RPC URL
    rpc_url: String,
    chain_id: u64,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    /// Creates a client for the chain's configured RPC endpoint.
    pub fn new(chain: &ChainDescriptor, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .map_err(|e| {
                OrchestratorError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            rpc_url: chain.rpc_endpoint.to_string(),
            chain_id: chain.chain_id,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        debug!("Sending {} to chain {} ({})", method, self.chain_id, self.rpc_url);

        let http_response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                OrchestratorError::Network(format!(
                    "failed to send {} to chain {}: {}",
                    method, self.chain_id, e
                ))
            })?;

        let status = http_response.status();
        if !status.is_success() {
            return Err(OrchestratorError::Network(format!(
                "{} on chain {} returned HTTP {}",
                method, self.chain_id, status
            )));
        }

        let response: JsonRpcResponse<T> = http_response.json().await.map_err(|e| {
            OrchestratorError::Network(format!(
                "failed to parse {} response from chain {}: {}",
                method, self.chain_id, e
            ))
        })?;

        if let Some(error) = response.error {
            warn!(
                "JSON-RPC error from chain {}: {} ({})",
                self.chain_id, error.message, error.code
            );
            return Err(OrchestratorError::Network(format!(
                "{} on chain {} failed: {} ({})",
                method, self.chain_id, error.message, error.code
            )));
        }

        response.result.ok_or_else(|| {
            OrchestratorError::Network(format!(
                "{} on chain {} returned no result",
                method, self.chain_id
            ))
        })
    }
}

#[async_trait]
impl ChainRpc for EvmRpcClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_native_balance(&self, address: Address) -> Result<U256> {
        let result: String = self
            .call(
                "eth_getBalance",
                vec![
                    serde_json::json!(format!("{:?}", address)),
                    serde_json::json!("latest"),
                ],
            )
            .await?;
        parse_quantity(&result)
    }

    async fn read_contract(&self, contract: Address, calldata: &[u8]) -> Result<Vec<u8>> {
        let call = serde_json::json!({
            "to": format!("{:?}", contract),
            "data": format!("0x{}", hex::encode(calldata)),
        });
        let result: String = self
            .call("eth_call", vec![call, serde_json::json!("latest")])
            .await?;
        let stripped = result.strip_prefix("0x").unwrap_or(&result);
        hex::decode(stripped).map_err(|e| {
            OrchestratorError::Network(format!(
                "invalid eth_call return data from chain {}: {}",
                self.chain_id, e
            ))
        })
    }
}

/// Parses a JSON-RPC hex quantity (`0x` alone is zero).
fn parse_quantity(value: &str) -> Result<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16)
        .map_err(|_| OrchestratorError::Network(format!("invalid hex quantity '{}'", value)))
}
