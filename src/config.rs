//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the orchestrator.
//! Configuration includes the relay connection, retry policy, signer source,
//! account factory deployments, participating chains and token mappings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::abi::{parse_address, parse_h256};
use crate::account::{FactoryConfig, FactoryDeployment};
use crate::chains::{ChainDescriptor, ChainRegistry};
use crate::error::{OrchestratorError, Result};
use crate::service::submission::ExecutionMode;
use crate::tokens::{TokenMapping, TokenMappingTable};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all orchestrator settings.
///
/// This structure holds configuration for:
/// - Relay service connection and polling
/// - Retry policy for network failures
/// - Signer key source
/// - Smart account factory deployments (one per chain)
/// - Participating chains (use [[chain]] in TOML)
/// - Token mappings (use [[token]] with nested [[token.deployment]])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Service configuration (relay URL, polling, gas defaults)
    pub service: ServiceConfig,
    /// Retry policy for retryable (network) failures
    #[serde(default)]
    pub retry: RetryConfig,
    /// Signer configuration
    pub signer: SignerConfig,
    /// Smart account factory configuration
    pub account: AccountConfig,
    /// Participating chains
    #[serde(default)]
    pub chain: Vec<ChainEntryConfig>,
    /// Logical tokens and their per-chain deployments
    #[serde(default)]
    pub token: Vec<TokenConfig>,
}

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Relay API base URL (e.g., "https://mee-node.biconomy.io")
    pub relay_url: String,
    /// Interval between execution status polls in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Maximum number of status polls before giving up on an execution
    #[serde(default = "default_max_status_polls")]
    pub max_status_polls: u32,
    /// Timeout applied to every HTTP request in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Gas ceiling used for calls that do not specify one
    #[serde(default = "default_gas_limit")]
    pub default_gas_limit: u64,
    /// How the relay should relay the signed supertransaction
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

/// Bounded retry policy for network errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Environment variable name containing the hex-encoded secp256k1 private key
    pub private_key_env: String,
}

impl SignerConfig {
    /// Reads the private key from the configured environment variable.
    pub fn get_private_key(&self) -> Result<[u8; 32]> {
        let raw = std::env::var(&self.private_key_env).map_err(|_| {
            OrchestratorError::Configuration(format!(
                "environment variable '{}' is not set",
                self.private_key_env
            ))
        })?;
        let hex_part = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
        let bytes = hex::decode(hex_part).map_err(|e| {
            OrchestratorError::Configuration(format!(
                "'{}' is not valid hex: {}",
                self.private_key_env, e
            ))
        })?;
        bytes.try_into().map_err(|b: Vec<u8>| {
            OrchestratorError::Configuration(format!(
                "'{}' must hold 32 bytes, got {}",
                self.private_key_env,
                b.len()
            ))
        })
    }
}

/// Smart account factory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account index mixed into the CREATE2 salt
    #[serde(default)]
    pub index: u64,
    /// Factory deployments, one per chain
    #[serde(default)]
    pub factory: Vec<FactoryEntryConfig>,
}

/// Factory deployment on a single chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryEntryConfig {
    pub chain_id: u64,
    /// Factory contract address (0x-prefixed, 20 bytes)
    pub factory_addr: String,
    /// keccak256 of the account proxy init code (0x-prefixed, 32 bytes)
    pub init_code_hash: String,
}

/// Configuration for a participating chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntryConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// Chain ID (e.g., 84532 for Base Sepolia)
    pub chain_id: u64,
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Decimals of the native currency
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
}

/// A logical token and where it lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Symbol used to reference the token (e.g., "USDC")
    pub symbol: String,
    /// Fixed decimal precision shared by every deployment
    pub decimals: u8,
    /// Per-chain contract addresses
    #[serde(default)]
    pub deployment: Vec<TokenDeploymentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDeploymentConfig {
    pub chain_id: u64,
    /// ERC-20 contract address (0x-prefixed, 20 bytes)
    pub address: String,
}

fn default_polling_interval_ms() -> u64 {
    2000
}

fn default_max_status_polls() -> u32 {
    90
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_gas_limit() -> u64 {
    100_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_native_decimals() -> u8 {
    18
}

impl OrchestratorConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Path priority: provided path, then `ORCHESTRATOR_CONFIG_PATH`, then
    /// `config/orchestrator.toml`. The configuration is validated before it is
    /// returned.
    pub fn load_from_path(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("ORCHESTRATOR_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/orchestrator.toml".to_string());

        if !std::path::Path::new(&config_path).exists() {
            return Err(OrchestratorError::Configuration(format!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/orchestrator.template.toml config/orchestrator.toml\n\
                Then edit config/orchestrator.toml with your actual values.",
                config_path
            )));
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            OrchestratorError::Configuration(format!("failed to read '{}': {}", config_path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: OrchestratorConfig = toml::from_str(content)
            .map_err(|e| OrchestratorError::Configuration(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks that the relay URL parses, chain IDs are unique, every factory
    /// and token deployment references a configured chain, and the retry
    /// policy allows at least one attempt. Building the registry, factory and
    /// token tables performs the remaining structural checks.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.service.relay_url).map_err(|e| {
            OrchestratorError::Configuration(format!(
                "invalid relay_url '{}': {}",
                self.service.relay_url, e
            ))
        })?;

        if self.chain.is_empty() {
            return Err(OrchestratorError::Configuration(
                "at least one [[chain]] must be configured".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(OrchestratorError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let registry = self.chain_registry()?;
        let factory = self.factory_config()?;
        for chain_id in registry.chain_ids() {
            if !factory.supports(chain_id) {
                return Err(OrchestratorError::Configuration(format!(
                    "chain {} has no [[account.factory]] entry",
                    chain_id
                )));
            }
        }

        let tokens = self.token_table()?;
        tokens.check_against(&registry)?;
        Ok(())
    }

    /// Builds the chain registry from the [[chain]] entries.
    pub fn chain_registry(&self) -> Result<ChainRegistry> {
        let mut descriptors = Vec::with_capacity(self.chain.len());
        for entry in &self.chain {
            let rpc_endpoint = url::Url::parse(&entry.rpc_url).map_err(|e| {
                OrchestratorError::Configuration(format!(
                    "invalid rpc_url '{}' for chain {}: {}",
                    entry.rpc_url, entry.chain_id, e
                ))
            })?;
            descriptors.push(ChainDescriptor {
                chain_id: entry.chain_id,
                name: entry.name.clone(),
                rpc_endpoint,
                native_decimals: entry.native_decimals,
            });
        }
        ChainRegistry::new(descriptors)
    }

    /// Builds the factory configuration from the [[account.factory]] entries.
    pub fn factory_config(&self) -> Result<FactoryConfig> {
        let mut seen = HashSet::new();
        let mut deployments = Vec::with_capacity(self.account.factory.len());
        for entry in &self.account.factory {
            if !seen.insert(entry.chain_id) {
                return Err(OrchestratorError::Configuration(format!(
                    "duplicate [[account.factory]] entry for chain {}",
                    entry.chain_id
                )));
            }
            deployments.push(FactoryDeployment {
                chain_id: entry.chain_id,
                factory: parse_address(&entry.factory_addr)?,
                init_code_hash: parse_h256(&entry.init_code_hash)?,
            });
        }
        Ok(FactoryConfig::new(self.account.index, deployments))
    }

    /// Builds the token mapping table from the [[token]] entries.
    pub fn token_table(&self) -> Result<TokenMappingTable> {
        let mut mappings = Vec::with_capacity(self.token.len());
        for token in &self.token {
            let mut deployments = Vec::with_capacity(token.deployment.len());
            for deployment in &token.deployment {
                deployments.push((deployment.chain_id, parse_address(&deployment.address)?));
            }
            mappings.push(TokenMapping::new(&token.symbol, token.decimals, deployments)?);
        }
        TokenMappingTable::new(mappings)
    }
}
