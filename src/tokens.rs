//! Token Mapping Table
//!
//! Maps a logical token symbol to its contract address on each chain. Every
//! token carries one fixed decimal precision that is declared with the
//! mapping and never read from chain mid-aggregation.

use ethereum_types::Address;
use std::collections::HashSet;

use crate::account::MultichainAccount;
use crate::chains::ChainRegistry;
use crate::error::{OrchestratorError, Result};
use crate::units::MAX_DECIMALS;

/// Contract addresses of one logical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMapping {
    symbol: String,
    decimals: u8,
    /// (chain_id, contract) in declaration order
    deployments: Vec<(u64, Address)>,
}

impl TokenMapping {
    /// Builds a mapping. Rejects an empty chain set, duplicate chain IDs and
    /// decimals above [`MAX_DECIMALS`].
    pub fn new(symbol: &str, decimals: u8, deployments: Vec<(u64, Address)>) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(OrchestratorError::Configuration(format!(
                "token {} declares {} decimals, at most {} supported",
                symbol, decimals, MAX_DECIMALS
            )));
        }
        if deployments.is_empty() {
            return Err(OrchestratorError::Configuration(format!(
                "token {} must be mapped on at least one chain",
                symbol
            )));
        }
        let mut seen = HashSet::new();
        for (chain_id, _) in &deployments {
            if !seen.insert(*chain_id) {
                return Err(OrchestratorError::Configuration(format!(
                    "token {} is mapped twice on chain {}",
                    symbol, chain_id
                )));
            }
        }
        Ok(Self {
            symbol: symbol.to_string(),
            decimals,
            deployments,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Contract address on `chain_id`.
    pub fn address_on(&self, chain_id: u64) -> Result<Address> {
        self.deployments
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, addr)| *addr)
            .ok_or_else(|| OrchestratorError::UnknownMapping {
                token: self.symbol.clone(),
                chain_id,
            })
    }

    /// Chains the token is mapped on, in declaration order.
    pub fn chains(&self) -> Vec<u64> {
        self.deployments.iter().map(|(id, _)| *id).collect()
    }
}

/// All known tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenMappingTable {
    tokens: Vec<TokenMapping>,
}

impl TokenMappingTable {
    /// Builds the table, rejecting duplicate symbols.
    pub fn new(tokens: Vec<TokenMapping>) -> Result<Self> {
        let mut seen = HashSet::new();
        for token in &tokens {
            if !seen.insert(token.symbol.clone()) {
                return Err(OrchestratorError::Configuration(format!(
                    "token {} is declared twice",
                    token.symbol
                )));
            }
        }
        Ok(Self { tokens })
    }

    pub fn mapping(&self, token: &str) -> Result<&TokenMapping> {
        self.tokens
            .iter()
            .find(|t| t.symbol == token)
            .ok_or_else(|| OrchestratorError::Configuration(format!("unknown token {}", token)))
    }

    /// Contract address of `token` on `chain_id`; an unregistered token and an
    /// unmapped chain are both `UnknownMapping`.
    pub fn address_for(&self, token: &str, chain_id: u64) -> Result<Address> {
        match self.tokens.iter().find(|t| t.symbol == token) {
            Some(mapping) => mapping.address_on(chain_id),
            None => Err(OrchestratorError::UnknownMapping {
                token: token.to_string(),
                chain_id,
            }),
        }
    }

    pub fn all_chains(&self, token: &str) -> Result<Vec<u64>> {
        Ok(self.mapping(token)?.chains())
    }

    /// Every mapped chain must be registered.
    pub fn check_against(&self, registry: &ChainRegistry) -> Result<()> {
        for token in &self.tokens {
            for chain_id in token.chains() {
                if !registry.contains(chain_id) {
                    return Err(OrchestratorError::Configuration(format!(
                        "token {} is mapped on unregistered chain {}",
                        token.symbol, chain_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every mapped chain must also have an account address.
    pub fn check_account(&self, account: &MultichainAccount) -> Result<()> {
        for token in &self.tokens {
            for chain_id in token.chains() {
                if !account.contains(chain_id) {
                    return Err(OrchestratorError::Configuration(format!(
                        "token {} is mapped on chain {} where the account has no address",
                        token.symbol, chain_id
                    )));
                }
            }
        }
        Ok(())
    }
}
