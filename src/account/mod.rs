//! Multichain smart account
//!
//! One owner, one counterfactual account address per chain. The mapping is
//! derived once and cached; it is only recomputed when the factory
//! configuration changes.

pub mod derivation;

use ethereum_types::Address;
use tracing::info;

use crate::chains::ChainRegistry;
use crate::error::{OrchestratorError, Result};

pub use derivation::{account_salt, derive_address, FactoryConfig, FactoryDeployment};

#[derive(Debug, Clone)]
pub struct MultichainAccount {
    /// Signer identity (EOA address); the signer itself is never stored here
    owner: Address,
    /// Per-chain account addresses in registry order
    addresses: Vec<(u64, Address)>,
    /// Factory configuration the addresses were derived from
    factory: FactoryConfig,
}

impl MultichainAccount {
    /// Derives the account address on every registered chain.
    ///
    /// Every registered chain must have a factory deployment.
    pub fn derive(owner: Address, registry: &ChainRegistry, factory: &FactoryConfig) -> Result<Self> {
        let addresses = registry
            .chain_ids()
            .map(|chain_id| Ok((chain_id, derive_address(owner, chain_id, factory)?)))
            .collect::<Result<Vec<_>>>()?;

        for (chain_id, address) in &addresses {
            info!(
                "Smart account on {} (chain {}): {:?}",
                registry.display_name(*chain_id),
                chain_id,
                address
            );
        }

        Ok(Self {
            owner,
            addresses,
            factory: factory.clone(),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Account address on `chain_id`.
    pub fn address_on(&self, chain_id: u64) -> Result<Address> {
        self.addresses
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, addr)| *addr)
            .ok_or_else(|| {
                OrchestratorError::Configuration(format!(
                    "account has no deployment address for chain {}",
                    chain_id
                ))
            })
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.addresses.iter().any(|(id, _)| *id == chain_id)
    }

    pub fn addresses(&self) -> &[(u64, Address)] {
        &self.addresses
    }

    /// Whether the cached addresses were derived from `factory`.
    pub fn is_derived_from(&self, factory: &FactoryConfig) -> bool {
        &self.factory == factory
    }
}
