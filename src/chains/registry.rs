//! Chain Registry
//!
//! Static description of the participating chains, built once from
//! configuration. Preserves configuration order for deterministic output.

use std::collections::HashSet;
use url::Url;

use crate::error::{OrchestratorError, Result};
use crate::units::MAX_DECIMALS;

/// Immutable description of one participating chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescriptor {
    /// Unique chain identifier (EIP-155)
    pub chain_id: u64,
    /// Human-readable name
    pub name: String,
    /// JSON-RPC endpoint
    pub rpc_endpoint: Url,
    /// Decimals of the native currency
    pub native_decimals: u8,
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
}

impl ChainRegistry {
    /// Builds a registry, rejecting an empty list, duplicate chain IDs and
    /// out-of-range native decimals.
    pub fn new(chains: Vec<ChainDescriptor>) -> Result<Self> {
        if chains.is_empty() {
            return Err(OrchestratorError::Configuration(
                "chain registry must contain at least one chain".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for chain in &chains {
            if chain.native_decimals > MAX_DECIMALS {
                return Err(OrchestratorError::Configuration(format!(
                    "chain {} declares {} native decimals, at most {} supported",
                    chain.chain_id, chain.native_decimals, MAX_DECIMALS
                )));
            }
            if !seen.insert(chain.chain_id) {
                return Err(OrchestratorError::Configuration(format!(
                    "duplicate chain id {} in registry",
                    chain.chain_id
                )));
            }
        }
        Ok(Self { chains })
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Looks up a chain, treating absence as a configuration error.
    pub fn require(&self, chain_id: u64) -> Result<&ChainDescriptor> {
        self.get(chain_id).ok_or_else(|| {
            OrchestratorError::Configuration(format!("chain {} is not registered", chain_id))
        })
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.get(chain_id).is_some()
    }

    /// Chain IDs in configuration order.
    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chains.iter().map(|c| c.chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    /// Display name for a chain, falling back to `Chain ID: N`.
    pub fn display_name(&self, chain_id: u64) -> String {
        match self.get(chain_id) {
            Some(chain) => chain.name.clone(),
            None => format!("Chain ID: {}", chain_id),
        }
    }
}
