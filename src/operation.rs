//! Operation Builder
//!
//! Turns logical intents ("transfer 0.3 USDC to R") into the concrete calls
//! the smart account executes on one chain. Pure data transformation: no
//! signing, no network access.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::abi::{encode_call, Token, ERC20_APPROVE, ERC20_TRANSFER};
use crate::error::{OrchestratorError, Result};
use crate::tokens::TokenMappingTable;

/// One call executed by the smart account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub gas_limit: u64,
}

/// Ordered calls scoped to one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOperation {
    pub chain_id: u64,
    pub calls: Vec<Call>,
}

/// What a call is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// A logical token resolved through the token mapping table
    Token(String),
    /// A concrete contract or account address
    Address(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionIntent {
    /// ERC-20 `transfer(recipient, amount)` on the target contract
    Transfer { recipient: Address },
    /// ERC-20 `approve(spender, amount)` on the target contract
    Approve { spender: Address },
    /// Send `amount` of native currency to the target address
    NativeTransfer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIntent {
    pub target: CallTarget,
    pub function: FunctionIntent,
    pub amount: U256,
    /// Overrides the builder's default gas ceiling
    pub gas_limit: Option<u64>,
}

impl CallIntent {
    /// ERC-20 transfer of a mapped token.
    pub fn token_transfer(token: &str, recipient: Address, amount: U256) -> Self {
        Self {
            target: CallTarget::Token(token.to_string()),
            function: FunctionIntent::Transfer { recipient },
            amount,
            gas_limit: None,
        }
    }
}

pub struct OperationBuilder<'a> {
    tokens: &'a TokenMappingTable,
    default_gas_limit: u64,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(tokens: &'a TokenMappingTable, default_gas_limit: u64) -> Self {
        Self {
            tokens,
            default_gas_limit,
        }
    }

    /// Encodes `intents` into one operation for `chain_id`, preserving order.
    pub fn build_operation(&self, chain_id: u64, intents: &[CallIntent]) -> Result<ChainOperation> {
        if intents.is_empty() {
            return Err(OrchestratorError::Validation(format!(
                "operation on chain {} has no calls",
                chain_id
            )));
        }

        let calls = intents
            .iter()
            .map(|intent| self.build_call(chain_id, intent))
            .collect::<Result<Vec<_>>>()?;

        Ok(ChainOperation { chain_id, calls })
    }

    fn build_call(&self, chain_id: u64, intent: &CallIntent) -> Result<Call> {
        if intent.amount.is_zero() {
            return Err(OrchestratorError::InvalidAmount { chain_id });
        }

        let to = match &intent.target {
            CallTarget::Token(symbol) => self.tokens.address_for(symbol, chain_id)?,
            CallTarget::Address(address) => *address,
        };
        let gas_limit = intent.gas_limit.unwrap_or(self.default_gas_limit);
        if gas_limit == 0 {
            return Err(OrchestratorError::Validation(format!(
                "gas limit on chain {} must be greater than zero",
                chain_id
            )));
        }

        let (value, data) = match &intent.function {
            FunctionIntent::Transfer { recipient } => (
                U256::zero(),
                encode_call(
                    ERC20_TRANSFER,
                    &[Token::Address(*recipient), Token::Uint(intent.amount)],
                ),
            ),
            FunctionIntent::Approve { spender } => (
                U256::zero(),
                encode_call(
                    ERC20_APPROVE,
                    &[Token::Address(*spender), Token::Uint(intent.amount)],
                ),
            ),
            FunctionIntent::NativeTransfer => {
                if matches!(intent.target, CallTarget::Token(_)) {
                    return Err(OrchestratorError::Validation(format!(
                        "native transfer on chain {} must target an address, not a token",
                        chain_id
                    )));
                }
                (intent.amount, Vec::new())
            }
        };

        Ok(Call {
            to,
            value,
            data,
            gas_limit,
        })
    }
}

/// `0x`-prefixed hex encoding for calldata.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = String::deserialize(deserializer)?;
        let stripped = value.strip_prefix("0x").unwrap_or(&value);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}
