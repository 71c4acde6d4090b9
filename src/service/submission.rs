//! Supertransaction Submission
//!
//! Drives one submission attempt through the relay:
//!
//! 1. **Built**: the supertransaction is assembled, nothing has been sent.
//! 2. **Quoted**: the relay priced it and returned the digest to sign. A
//!    failed quote leaves the submission in `Built`; no signature is ever
//!    requested for an unquoted supertransaction.
//! 3. **Signed**: the signer signed the quote digest, exactly once. That one
//!    signature authorizes every chain operation because the digest commits
//!    to the whole supertransaction.
//! 4. **Submitted**: the relay accepted the signed execution and returned a
//!    tracking handle. Network failures are retried with the identical
//!    signed execution; the submission never re-signs.
//! 5. **Confirmed / Failed**: every chain reached a terminal status.
//!
//! The signature lives only inside the submission and is dropped once the
//! relay accepts it, when the submission is aborted, or when the relay
//! rejects it.

use ethereum_types::H256;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto::Signer;
use crate::error::{OrchestratorError, Result};
use crate::relay_client::{ExecutionHandle, Quote, QuoteRequest, RelayApi};
use crate::service::retry::{with_retry, RetryPolicy};
use crate::service::tracker::{ExecutionOutcome, ExecutionReport, ExecutionTracker};
use crate::supertransaction::Supertransaction;

/// How the relay should relay the signed supertransaction.
///
/// The mode is carried as a 4-byte prefix on the signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Relay submits directly on behalf of the account
    #[default]
    Direct,
    /// Execution is triggered by an on-chain transaction
    OnChain,
    /// Fee is paid through an ERC-2612 permit
    Erc20Permit,
}

impl ExecutionMode {
    pub fn signature_prefix(self) -> [u8; 4] {
        match self {
            ExecutionMode::Direct => [0x17, 0x7e, 0xee, 0x00],
            ExecutionMode::OnChain => [0x17, 0x7e, 0xee, 0x01],
            ExecutionMode::Erc20Permit => [0x17, 0x7e, 0xee, 0x02],
        }
    }
}

/// Quote digest signature plus execution mode.
///
/// Not `Clone`; `Debug` redacts the signature.
pub struct SignedExecution {
    quote_hash: H256,
    signature: Vec<u8>,
    mode: ExecutionMode,
}

impl SignedExecution {
    pub fn new(quote_hash: H256, signature: Vec<u8>, mode: ExecutionMode) -> Self {
        Self {
            quote_hash,
            signature,
            mode,
        }
    }

    pub fn quote_hash(&self) -> H256 {
        self.quote_hash
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `0x ‖ mode prefix ‖ r ‖ s ‖ v`
    pub fn wire_signature(&self) -> String {
        let mut bytes = Vec::with_capacity(4 + self.signature.len());
        bytes.extend_from_slice(&self.mode.signature_prefix());
        bytes.extend_from_slice(&self.signature);
        format!("0x{}", hex::encode(bytes))
    }
}

impl std::fmt::Debug for SignedExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedExecution")
            .field("quote_hash", &self.quote_hash)
            .field("signature", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Built,
    Quoted,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl SubmissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionState::Built => "Built",
            SubmissionState::Quoted => "Quoted",
            SubmissionState::Signed => "Signed",
            SubmissionState::Submitted => "Submitted",
            SubmissionState::Confirmed => "Confirmed",
            SubmissionState::Failed => "Failed",
        }
    }
}

/// One submission attempt of a supertransaction.
#[derive(Debug)]
pub struct Submission {
    request: QuoteRequest,
    state: SubmissionState,
    quote: Option<Quote>,
    signed: Option<SignedExecution>,
    handle: Option<ExecutionHandle>,
}

impl Submission {
    pub fn new(request: QuoteRequest) -> Self {
        Self {
            request,
            state: SubmissionState::Built,
            quote: None,
            signed: None,
            handle: None,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn supertransaction(&self) -> &Supertransaction {
        &self.request.supertransaction
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    pub fn handle(&self) -> Option<ExecutionHandle> {
        self.handle
    }

    /// Whether a signature is currently held.
    pub fn has_signature(&self) -> bool {
        self.signed.is_some()
    }

    fn expect_state(&self, expected: SubmissionState) -> Result<()> {
        if self.state != expected {
            return Err(OrchestratorError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// `Built → Quoted`.
    ///
    /// The quote must price exactly the supertransaction that was sent, in
    /// the designated fee token; anything else is rejected before signing.
    /// Network failures are retried; nothing has been signed yet, so asking
    /// again is harmless.
    pub async fn request_quote(&mut self, relay: &dyn RelayApi, retry: &RetryPolicy) -> Result<&Quote> {
        self.expect_state(SubmissionState::Built)?;

        let quote = {
            let request = &self.request;
            with_retry(retry, "quote", || relay.get_quote(request)).await?
        };

        if quote.supertransaction != self.request.supertransaction {
            return Err(OrchestratorError::Quote(format!(
                "quote {:?} does not match the requested supertransaction",
                quote.hash
            )));
        }
        let fee_token = self.request.supertransaction.fee_token();
        if quote.fee.fee_token != fee_token {
            return Err(OrchestratorError::Quote(format!(
                "quote {:?} charges fee on chain {} token {:?}, expected chain {} token {:?}",
                quote.hash,
                quote.fee.fee_token.chain_id,
                quote.fee.fee_token.token_address,
                fee_token.chain_id,
                fee_token.token_address
            )));
        }

        self.state = SubmissionState::Quoted;
        Ok(&*self.quote.insert(quote))
    }

    /// `Quoted → Signed`. Signs the quote digest exactly once.
    pub async fn sign(&mut self, signer: &dyn Signer, mode: ExecutionMode) -> Result<()> {
        self.expect_state(SubmissionState::Quoted)?;
        let hash = self
            .quote
            .as_ref()
            .map(|q| q.hash)
            .ok_or_else(|| OrchestratorError::Quote("quoted submission has no quote".to_string()))?;

        let signature = signer.sign_digest(hash).await?;
        if signature.len() != 65 {
            return Err(OrchestratorError::Signing(format!(
                "expected 65-byte signature, got {}",
                signature.len()
            )));
        }

        info!("Signed quote {:?} ({:?} mode)", hash, mode);
        self.signed = Some(SignedExecution::new(hash, signature, mode));
        self.state = SubmissionState::Signed;
        Ok(())
    }

    /// `Signed → Submitted`.
    ///
    /// Network failures are retried with the same signed execution. When
    /// retries are exhausted the submission stays `Signed` so the caller can
    /// resubmit later without re-signing. An expired quote aborts back to
    /// `Built`; any other rejection marks the submission `Failed`.
    pub async fn submit(&mut self, relay: &dyn RelayApi, retry: &RetryPolicy) -> Result<ExecutionHandle> {
        self.expect_state(SubmissionState::Signed)?;

        let result = {
            let signed = self
                .signed
                .as_ref()
                .ok_or_else(|| OrchestratorError::Signing("signed submission has no signature".to_string()))?;
            with_retry(retry, "execute", || relay.execute(signed)).await
        };

        match result {
            Ok(handle) => {
                self.signed = None;
                self.handle = Some(handle);
                self.state = SubmissionState::Submitted;
                Ok(handle)
            }
            Err(e @ OrchestratorError::QuoteExpired(_)) => {
                warn!("Quote expired before execution; discarding signature");
                self.abort()?;
                Err(e)
            }
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                self.signed = None;
                self.quote = None;
                self.state = SubmissionState::Failed;
                Err(e)
            }
        }
    }

    /// `Submitted → Confirmed | Failed`.
    pub async fn await_completion(&mut self, tracker: &ExecutionTracker) -> Result<ExecutionReport> {
        self.expect_state(SubmissionState::Submitted)?;
        let handle = self.handle.ok_or(OrchestratorError::InvalidState {
            expected: "Submitted",
            actual: "Submitted without handle",
        })?;

        let report = tracker
            .track(&handle, &self.request.supertransaction.chain_ids())
            .await?;
        self.state = match report.outcome {
            ExecutionOutcome::Confirmed => SubmissionState::Confirmed,
            ExecutionOutcome::Failed => SubmissionState::Failed,
        };
        Ok(report)
    }

    /// Discards the quote and any signature and returns to `Built`.
    ///
    /// Only allowed before the relay has accepted the execution.
    pub fn abort(&mut self) -> Result<()> {
        match self.state {
            SubmissionState::Built | SubmissionState::Quoted | SubmissionState::Signed => {
                self.signed = None;
                self.quote = None;
                self.state = SubmissionState::Built;
                Ok(())
            }
            other => Err(OrchestratorError::InvalidState {
                expected: "Built, Quoted or Signed",
                actual: other.as_str(),
            }),
        }
    }
}
