//! Supertransaction Assembler
//!
//! Groups per-chain operations with the fee-payment token into one signable
//! aggregate. The assembler validates shape only; the canonical hash is
//! computed by the relay when it quotes the aggregate.

use ethereum_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{OrchestratorError, Result};
use crate::operation::ChainOperation;

/// Token the relay fee is paid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeToken {
    pub chain_id: u64,
    pub token_address: Address,
}

/// One operation per chain plus the fee token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supertransaction {
    operations: Vec<ChainOperation>,
    fee_token: FeeToken,
}

impl Supertransaction {
    pub fn operations(&self) -> &[ChainOperation] {
        &self.operations
    }

    pub fn fee_token(&self) -> FeeToken {
        self.fee_token
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.operations.iter().map(|op| op.chain_id).collect()
    }
}

/// Assembles a supertransaction.
///
/// Rejects an empty operation list, two operations on the same chain
/// (`DuplicateChain`; callers merge intents per chain before assembling) and
/// a fee token on a chain that carries no operation (`FeeChainNotIncluded`).
pub fn assemble(operations: Vec<ChainOperation>, fee_token: FeeToken) -> Result<Supertransaction> {
    if operations.is_empty() {
        return Err(OrchestratorError::Validation(
            "supertransaction must contain at least one operation".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(operations.len());
    for op in &operations {
        if !seen.insert(op.chain_id) {
            return Err(OrchestratorError::DuplicateChain(op.chain_id));
        }
    }

    if !seen.contains(&fee_token.chain_id) {
        return Err(OrchestratorError::FeeChainNotIncluded(fee_token.chain_id));
    }

    Ok(Supertransaction {
        operations,
        fee_token,
    })
}
