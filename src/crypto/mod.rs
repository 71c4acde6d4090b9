//! Cryptographic operations for the orchestrator
//!
//! This module provides digest signing and signer address recovery.

pub mod signer;

// Re-export for convenience
pub use signer::{personal_message_hash, public_key_to_address, recover_signer, LocalSigner, Signer};
