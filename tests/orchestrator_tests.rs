//! Integration tests for the orchestrator over in-memory chains and relay

use ethereum_types::U256;
use orchestrator::{
    account::derive_address,
    error::ErrorKind,
    relay_client::{ChainExecutionStatus, QuoteRequest},
    service::{ExecutionOutcome, Submission, SubmissionState, TransferRequest},
    OrchestratorError,
};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    addr, chain_execution, create_factory_with, create_test_factory, create_test_orchestrator,
    execution_status, hash, test_signer, MockChain, MockRelay, DUMMY_AGGREGATE_HASH,
    DUMMY_CHAIN_UNKNOWN, DUMMY_CHAIN_X, DUMMY_CHAIN_Y, DUMMY_FACTORY_ADDR_2, DUMMY_RECIPIENT_ADDR,
    DUMMY_USDC_ADDR_X,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// 0.3 USDC from X and 0.1 USDC from Y, fee paid on X
fn create_transfer_request() -> TransferRequest {
    TransferRequest {
        token: "USDC".to_string(),
        recipient: addr(DUMMY_RECIPIENT_ADDR),
        amounts: vec![
            (DUMMY_CHAIN_X, U256::from(300_000u64)),
            (DUMMY_CHAIN_Y, U256::from(100_000u64)),
        ],
        fee_chain: DUMMY_CHAIN_X,
    }
}

fn default_chains() -> Vec<std::sync::Arc<MockChain>> {
    vec![
        MockChain::new(DUMMY_CHAIN_X, 2_000_000_000_000_000_000, 150_000),
        MockChain::new(DUMMY_CHAIN_Y, 500_000_000_000_000_000, 250_000),
    ]
}

// ============================================================================
// ACCOUNT VIEW TESTS
// ============================================================================

/// What is tested: refresh_view() over all mapped chains
/// Why: The view combines addresses, native balances and the unified token total
#[tokio::test]
async fn test_refresh_view() {
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), MockRelay::new(), signer.clone());

    let view = orchestrator.refresh_view(&[], "USDC").await.unwrap();

    assert_eq!(view.owner, orchestrator.account().owner());
    assert_eq!(view.addresses.len(), 2);
    assert_eq!(
        view.addresses[0].1,
        derive_address(view.owner, DUMMY_CHAIN_X, &create_test_factory()).unwrap()
    );
    assert_eq!(view.token.total, U256::from(400_000u64));
    assert_eq!(view.token.formatted_total(), "0.4");
    assert_eq!(view.native[0].formatted(), "2");
    assert_eq!(view.native[1].formatted(), "0.5");
}

/// What is tested: refresh_view() on a subset of chains
/// Why: Callers can restrict the view to specific chains
#[tokio::test]
async fn test_refresh_view_subset() {
    let orchestrator = create_test_orchestrator(default_chains(), MockRelay::new(), test_signer());

    let view = orchestrator.refresh_view(&[DUMMY_CHAIN_Y], "USDC").await.unwrap();

    assert_eq!(view.token.total, U256::from(250_000u64));
    assert_eq!(view.native.len(), 1);
}

/// What is tested: refresh_view() with an unknown chain or token
/// Why: Configuration errors are returned before any chain is queried
#[tokio::test]
async fn test_refresh_view_configuration_errors() {
    let chains = default_chains();
    let orchestrator = create_test_orchestrator(chains.clone(), MockRelay::new(), test_signer());

    let err = orchestrator
        .refresh_view(&[DUMMY_CHAIN_X, DUMMY_CHAIN_UNKNOWN], "USDC")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(orchestrator.refresh_view(&[], "DAI").await.is_err());
    assert!(chains.iter().all(|c| c.call_count() == 0));
}

/// What is tested: refresh_view() when one chain is down
/// Why: The view is all-or-nothing, after bounded retries
#[tokio::test]
async fn test_refresh_view_chain_down() {
    let failing = MockChain::failing(DUMMY_CHAIN_Y);
    let orchestrator = create_test_orchestrator(
        vec![MockChain::new(DUMMY_CHAIN_X, 0, 150_000), failing.clone()],
        MockRelay::new(),
        test_signer(),
    );

    let err = orchestrator.refresh_view(&[], "USDC").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    // native and token reads, three attempts
    assert!(failing.call_count() >= 3);
}

// ============================================================================
// TRANSFER TESTS
// ============================================================================

/// What is tested: a two-chain transfer is quoted, signed once and submitted
/// Why: One signature must cover operations on every chain
#[tokio::test]
async fn test_submit_transfer() {
    let relay = MockRelay::new();
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), signer.clone());

    let handle = orchestrator
        .submit_transfer(&create_transfer_request())
        .await
        .unwrap();

    assert_eq!(handle.aggregate_hash, hash(DUMMY_AGGREGATE_HASH));
    assert_eq!(relay.quote_count(), 1);
    assert_eq!(relay.executed().len(), 1);
    assert_eq!(signer.sign_count(), 1);
}

/// What is tested: the assembled supertransaction for a transfer request
/// Why: One operation per chain, fee token resolved on the fee chain
#[test]
fn test_build_supertransaction() {
    let orchestrator = create_test_orchestrator(default_chains(), MockRelay::new(), test_signer());

    let supertx = orchestrator
        .build_supertransaction(&create_transfer_request())
        .unwrap();

    assert_eq!(supertx.chain_ids(), vec![DUMMY_CHAIN_X, DUMMY_CHAIN_Y]);
    assert_eq!(supertx.fee_token().token_address, addr(DUMMY_USDC_ADDR_X));
}

/// What is tested: fee on a chain outside the operations
/// Why: FeeChainNotIncluded is raised before contacting the relay
#[tokio::test]
async fn test_submit_transfer_fee_chain_not_included() {
    let relay = MockRelay::new();
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), signer.clone());
    let request = TransferRequest {
        amounts: vec![(DUMMY_CHAIN_X, U256::from(300_000u64))],
        fee_chain: DUMMY_CHAIN_Y,
        ..create_transfer_request()
    };

    let err = orchestrator.submit_transfer(&request).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::FeeChainNotIncluded(DUMMY_CHAIN_Y)));
    assert_eq!(relay.quote_count(), 0);
    assert_eq!(signer.sign_count(), 0);
}

/// What is tested: invalid transfer requests
/// Why: Zero amounts and repeated chains are validation errors without network calls
#[tokio::test]
async fn test_submit_transfer_validation() {
    let relay = MockRelay::new();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), test_signer());

    let zero = TransferRequest {
        amounts: vec![(DUMMY_CHAIN_X, U256::zero())],
        ..create_transfer_request()
    };
    assert!(matches!(
        orchestrator.submit_transfer(&zero).await,
        Err(OrchestratorError::InvalidAmount { chain_id: DUMMY_CHAIN_X })
    ));

    let duplicate = TransferRequest {
        amounts: vec![(DUMMY_CHAIN_X, U256::one()), (DUMMY_CHAIN_X, U256::one())],
        ..create_transfer_request()
    };
    assert!(matches!(
        orchestrator.submit_transfer(&duplicate).await,
        Err(OrchestratorError::DuplicateChain(DUMMY_CHAIN_X))
    ));
    assert_eq!(relay.quote_count(), 0);
}

/// What is tested: the relay refuses the quote
/// Why: No signature is ever produced for an unquoted supertransaction
#[tokio::test]
async fn test_submit_transfer_quote_refused() {
    let relay = MockRelay::new();
    relay.push_quote_error(OrchestratorError::Quote("insufficient fee token balance".to_string()));
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), signer.clone());

    let err = orchestrator
        .submit_transfer(&create_transfer_request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Relay);
    assert_eq!(signer.sign_count(), 0);
    assert!(relay.executed().is_empty());
}

/// What is tested: the quote expires between signing and submission
/// Why: One fresh quote and signature are obtained for the same content
#[tokio::test]
async fn test_submit_transfer_requotes_once_on_expiry() {
    let relay = MockRelay::new();
    relay.push_execute_error(OrchestratorError::QuoteExpired("first".to_string()));
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), signer.clone());

    orchestrator
        .submit_transfer(&create_transfer_request())
        .await
        .unwrap();

    let executed = relay.executed();
    assert_eq!(relay.quote_count(), 2);
    assert_eq!(signer.sign_count(), 2);
    assert_eq!(executed.len(), 2);
    assert_ne!(executed[0].0, executed[1].0);
}

/// What is tested: the renewed quote expires too
/// Why: Renewal is bounded; the expiry is surfaced to the caller
#[tokio::test]
async fn test_submit_transfer_expiry_twice() {
    let relay = MockRelay::new();
    relay.push_execute_error(OrchestratorError::QuoteExpired("first".to_string()));
    relay.push_execute_error(OrchestratorError::QuoteExpired("second".to_string()));
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), test_signer());

    let err = orchestrator
        .submit_transfer(&create_transfer_request())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::QuoteExpired(_)));
    assert_eq!(relay.quote_count(), 2);
}

/// What is tested: the relay stays unreachable after signing, then recovers
/// Why: The signed submission is handed back and resubmitted without re-signing
#[tokio::test]
async fn test_submit_transfer_resumes_with_same_signature() {
    let relay = MockRelay::new();
    for _ in 0..3 {
        relay.push_execute_error(OrchestratorError::Network("timeout".to_string()));
    }
    let signer = test_signer();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), signer.clone());

    let err = orchestrator
        .submit_transfer(&create_transfer_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Pending);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("timeout"));

    let pending = err.into_pending().unwrap();
    assert_eq!(pending.state(), SubmissionState::Signed);
    assert!(pending.has_signature());

    let handle = orchestrator.resume_submission(pending).await.unwrap();
    assert_eq!(handle.aggregate_hash, hash(DUMMY_AGGREGATE_HASH));

    let executed = relay.executed();
    assert_eq!(executed.len(), 4);
    assert!(executed.iter().all(|e| *e == executed[0]));
    assert_eq!(signer.sign_count(), 1);
    assert_eq!(relay.quote_count(), 1);
}

/// What is tested: resume_submission() with a submission that was never signed
/// Why: Only a signed submission can be resumed
#[tokio::test]
async fn test_resume_submission_requires_signed() {
    let relay = MockRelay::new();
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), test_signer());
    let supertransaction = orchestrator
        .build_supertransaction(&create_transfer_request())
        .unwrap();
    let built = Submission::new(QuoteRequest {
        owner: orchestrator.account().owner(),
        accounts: vec![],
        supertransaction,
    });

    let result = orchestrator.resume_submission(built).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::InvalidState { expected: "Signed", actual: "Built" })
    ));
    assert_eq!(relay.quote_count(), 0);
    assert!(relay.executed().is_empty());
}

/// What is tested: X confirms and Y fails
/// Why: Partial failure surfaces as PartialExecutionFailure with both chain outcomes
#[tokio::test]
async fn test_transfer_and_wait_partial_failure() {
    let relay = MockRelay::new();
    relay.push_status(execution_status(vec![
        chain_execution(DUMMY_CHAIN_X, ChainExecutionStatus::Confirmed),
        chain_execution(DUMMY_CHAIN_Y, ChainExecutionStatus::Failed),
    ]));
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), test_signer());

    let err = orchestrator
        .transfer_and_wait(&create_transfer_request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PartialExecution);
    match err {
        OrchestratorError::PartialExecutionFailure(report) => {
            assert_eq!(report.outcome, ExecutionOutcome::Failed);
            assert_eq!(report.status_of(DUMMY_CHAIN_X), Some(ChainExecutionStatus::Confirmed));
            assert_eq!(report.status_of(DUMMY_CHAIN_Y), Some(ChainExecutionStatus::Failed));
        }
        other => panic!("expected PartialExecutionFailure, got {:?}", other),
    }
}

/// What is tested: every chain confirms
/// Why: A fully confirmed supertransaction returns its report
#[tokio::test]
async fn test_transfer_and_wait_confirmed() {
    let relay = MockRelay::new();
    relay.push_status(execution_status(vec![
        chain_execution(DUMMY_CHAIN_X, ChainExecutionStatus::Confirmed),
        chain_execution(DUMMY_CHAIN_Y, ChainExecutionStatus::Confirmed),
    ]));
    let orchestrator = create_test_orchestrator(default_chains(), relay.clone(), test_signer());

    let report = orchestrator
        .transfer_and_wait(&create_transfer_request())
        .await
        .unwrap();
    assert_eq!(report.outcome, ExecutionOutcome::Confirmed);

    let again = orchestrator
        .await_execution(&report.handle, &[DUMMY_CHAIN_X, DUMMY_CHAIN_Y])
        .await
        .unwrap();
    assert_eq!(again, report);
}

// ============================================================================
// FACTORY CONFIGURATION TESTS
// ============================================================================

/// What is tested: update_factory_config() re-derives only on change
/// Why: Addresses are cached and recomputed only when the factory changes
#[test]
fn test_update_factory_config() {
    let mut orchestrator = create_test_orchestrator(default_chains(), MockRelay::new(), test_signer());
    let before = orchestrator.account().address_on(DUMMY_CHAIN_X).unwrap();

    orchestrator.update_factory_config(create_test_factory()).unwrap();
    assert_eq!(orchestrator.account().address_on(DUMMY_CHAIN_X).unwrap(), before);

    orchestrator
        .update_factory_config(create_factory_with(DUMMY_FACTORY_ADDR_2, 0))
        .unwrap();
    let after = orchestrator.account().address_on(DUMMY_CHAIN_X).unwrap();
    assert_ne!(after, before);
    assert_eq!(
        orchestrator.factory_config(),
        &create_factory_with(DUMMY_FACTORY_ADDR_2, 0)
    );
}
