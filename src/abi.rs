//! Minimal EVM ABI helpers
//!
//! Just enough encoding for the calls this crate issues: function selectors,
//! static `address`/`uint256` arguments, and decoding a single `uint256`
//! return word. Also parses `0x`-prefixed hex addresses and digests.

use ethereum_types::{Address, H256, U256};
use sha3::{Digest, Keccak256};

use crate::error::{OrchestratorError, Result};

pub const ERC20_TRANSFER: &str = "transfer(address,uint256)";
pub const ERC20_APPROVE: &str = "approve(address,uint256)";
pub const ERC20_BALANCE_OF: &str = "balanceOf(address)";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of keccak256 of the canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A single static argument word.
#[derive(Debug, Clone, Copy)]
pub enum Token {
    Address(Address),
    Uint(U256),
}

impl Token {
    fn to_word(self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
            Token::Uint(value) => value.to_big_endian(&mut word),
        }
        word
    }
}

/// Encodes `selector ‖ args` for a function with static arguments only.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Decodes the first 32-byte word of a return value as `uint256`.
pub fn decode_uint(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        return Err(OrchestratorError::Network(format!(
            "return data too short for uint256: {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_big_endian(&data[..32]))
}

/// Parses a `0x`-prefixed 20-byte hex address.
pub fn parse_address(value: &str) -> Result<Address> {
    let bytes = decode_prefixed(value, 20, "address")?;
    Ok(Address::from_slice(&bytes))
}

/// Parses a `0x`-prefixed 32-byte hex digest.
pub fn parse_h256(value: &str) -> Result<H256> {
    let bytes = decode_prefixed(value, 32, "hash")?;
    Ok(H256::from_slice(&bytes))
}

fn decode_prefixed(value: &str, expected_len: usize, what: &str) -> Result<Vec<u8>> {
    let stripped = value.strip_prefix("0x").ok_or_else(|| {
        OrchestratorError::Validation(format!("{} must be 0x-prefixed hex: '{}'", what, value))
    })?;
    let bytes = hex::decode(stripped).map_err(|e| {
        OrchestratorError::Validation(format!("invalid hex {} '{}': {}", what, value, e))
    })?;
    if bytes.len() != expected_len {
        return Err(OrchestratorError::Validation(format!(
            "invalid {} length: expected {} bytes, got {}",
            what,
            expected_len,
            bytes.len()
        )));
    }
    Ok(bytes)
}
