//! Counterfactual account address derivation
//!
//! A smart account's address is fixed before the account exists: the factory
//! deploys it with CREATE2, so the address follows from the factory address,
//! a salt bound to the owner, and the hash of the proxy init code.
//!
//! ```text
//! salt    = keccak256(owner ‖ uint256(account_index))
//! address = keccak256(0xff ‖ factory ‖ salt ‖ init_code_hash)[12..32]
//! ```
//!
//! Two chains whose factory deployments share the same factory address and
//! init code hash produce the same account address. That is the usual setup
//! for deterministic-deployment factories and is expected, not a collision.

use ethereum_types::{Address, H256, U256};

use crate::abi::keccak256;
use crate::error::{OrchestratorError, Result};

/// Account factory deployed on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryDeployment {
    pub chain_id: u64,
    pub factory: Address,
    pub init_code_hash: H256,
}

/// Factory deployments across chains plus the account index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryConfig {
    account_index: u64,
    deployments: Vec<FactoryDeployment>,
}

impl FactoryConfig {
    pub fn new(account_index: u64, deployments: Vec<FactoryDeployment>) -> Self {
        Self {
            account_index,
            deployments,
        }
    }

    pub fn account_index(&self) -> u64 {
        self.account_index
    }

    pub fn deployment(&self, chain_id: u64) -> Option<&FactoryDeployment> {
        self.deployments.iter().find(|d| d.chain_id == chain_id)
    }

    pub fn supports(&self, chain_id: u64) -> bool {
        self.deployment(chain_id).is_some()
    }
}

/// CREATE2 salt binding the account to its owner and index.
pub fn account_salt(owner: Address, account_index: u64) -> H256 {
    let mut preimage = [0u8; 52];
    preimage[..20].copy_from_slice(owner.as_bytes());
    U256::from(account_index).to_big_endian(&mut preimage[20..]);
    H256(keccak256(&preimage))
}

/// Computes the address the factory would deploy the owner's account at on
/// `chain_id`.
///
/// Pure and offline. Fails with `UnsupportedChain` if the factory
/// configuration has no deployment for the chain.
pub fn derive_address(owner: Address, chain_id: u64, factory: &FactoryConfig) -> Result<Address> {
    let deployment = factory
        .deployment(chain_id)
        .ok_or(OrchestratorError::UnsupportedChain(chain_id))?;

    let salt = account_salt(owner, factory.account_index);

    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployment.factory.as_bytes());
    preimage[21..53].copy_from_slice(salt.as_bytes());
    preimage[53..].copy_from_slice(deployment.init_code_hash.as_bytes());

    let hash = keccak256(&preimage);
    Ok(Address::from_slice(&hash[12..]))
}
