//! Digest signing
//!
//! The [`Signer`] trait is the only path to key material: callers hand it a
//! 32-byte digest and receive a 65-byte `r ‖ s ‖ v` signature. Signatures
//! follow EIP-191 personal-sign over the raw digest, which is what the relay
//! verifies against the account owner.

use async_trait::async_trait;
use ethereum_types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};

use crate::abi::keccak256;
use crate::error::{OrchestratorError, Result};

const PERSONAL_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Produces signatures without exposing key material.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public identity (EOA address) of the signer.
    fn address(&self) -> Address;

    /// Signs `digest`, returning `r ‖ s ‖ v` (65 bytes, `v` in {27, 28}).
    async fn sign_digest(&self, digest: H256) -> Result<Vec<u8>>;
}

/// In-process secp256k1 signer.
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn from_bytes(private_key: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(&(*private_key).into())
            .map_err(|e| OrchestratorError::Configuration(format!("invalid private key: {}", e)))?;
        let address = public_key_to_address(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_digest(&self, digest: H256) -> Result<Vec<u8>> {
        let prehash = personal_message_hash(digest);
        let (signature, recovery_id): (EcdsaSignature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| OrchestratorError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(recovery_id.to_byte() + 27);
        Ok(out)
    }
}

/// keccak256("\x19Ethereum Signed Message:\n32" ‖ digest)
pub fn personal_message_hash(digest: H256) -> [u8; 32] {
    let mut message = Vec::with_capacity(PERSONAL_SIGN_PREFIX.len() + 32);
    message.extend_from_slice(PERSONAL_SIGN_PREFIX);
    message.extend_from_slice(digest.as_bytes());
    keccak256(&message)
}

/// Ethereum address of a secp256k1 public key: last 20 bytes of
/// keccak256 of the uncompressed point without its 0x04 tag.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_signer(digest: H256, signature: &[u8]) -> Result<Address> {
    if signature.len() != 65 {
        return Err(OrchestratorError::Signing(format!(
            "expected 65-byte signature, got {}",
            signature.len()
        )));
    }
    let sig = EcdsaSignature::from_slice(&signature[..64])
        .map_err(|e| OrchestratorError::Signing(e.to_string()))?;
    let v = signature[64].checked_sub(27).unwrap_or(signature[64]);
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| OrchestratorError::Signing(format!("invalid recovery id {}", v)))?;
    let key = VerifyingKey::recover_from_prehash(&personal_message_hash(digest), &sig, recovery_id)
        .map_err(|e| OrchestratorError::Signing(e.to_string()))?;
    Ok(public_key_to_address(&key))
}
