//! Shared test helpers for orchestrator tests
//!
//! This module provides constants, builders and in-memory doubles for the
//! chain RPC, relay and signer seams.

#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use orchestrator::{
    abi::{parse_address, parse_h256},
    account::{FactoryConfig, FactoryDeployment},
    balance::BalanceAggregator,
    chains::{ChainDescriptor, ChainRegistry, ChainRpc},
    crypto::{LocalSigner, Signer},
    error::{OrchestratorError, Result},
    relay_client::{
        ChainExecution, ChainExecutionStatus, ExecutionHandle, ExecutionStatus, FeeBreakdown,
        Quote, QuoteRequest, RelayApi,
    },
    service::{ExecutionMode, Orchestrator, OrchestratorSettings, RetryPolicy, SignedExecution},
    tokens::{TokenMapping, TokenMappingTable},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- CHAINS --------------------------------

/// Base Sepolia chain ID ("chain X" in scenarios)
pub const DUMMY_CHAIN_X: u64 = 84532;

/// Arbitrum Sepolia chain ID ("chain Y" in scenarios)
pub const DUMMY_CHAIN_Y: u64 = 421614;

/// Chain ID that is never registered
pub const DUMMY_CHAIN_UNKNOWN: u64 = 999_999;

// --------------------------------- KEYS ---------------------------------

/// Dummy secp256k1 private key (valid scalar)
pub const DUMMY_PRIVATE_KEY: [u8; 32] = [0x11; 32];

/// Second dummy secp256k1 private key
pub const DUMMY_PRIVATE_KEY_2: [u8; 32] = [0x22; 32];

// -------------------------------- USERS ---------------------------------

/// Dummy recipient address (EVM format, 40 hex characters)
pub const DUMMY_RECIPIENT_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// Dummy account owner address (EVM format, 40 hex characters)
pub const DUMMY_OWNER_ADDR: &str = "0x0000000000000000000000000000000000000007";

// ------------------------- TOKENS AND CONTRACTS -------------------------

/// USDC on chain X
pub const DUMMY_USDC_ADDR_X: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// USDC on chain Y
pub const DUMMY_USDC_ADDR_Y: &str = "0xf3c3351d6bd0098eeb33ca8f830faf2a141ea2e1";

/// Dummy account factory address (EVM format, 40 hex characters)
pub const DUMMY_FACTORY_ADDR: &str = "0x000000000000000000000000000000000000fac7";

/// Second dummy account factory address
pub const DUMMY_FACTORY_ADDR_2: &str = "0x000000000000000000000000000000000000fac8";

/// Dummy proxy init code hash (64 hex characters)
pub const DUMMY_INIT_CODE_HASH: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000c0";

/// Dummy aggregate execution hash (64 hex characters)
pub const DUMMY_AGGREGATE_HASH: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

/// Relay fee charged by the mock relay (raw units)
pub const DUMMY_FEE_AMOUNT: u64 = 1_000;

pub const DUMMY_GAS_LIMIT: u64 = 100_000;

// ============================================================================
// BUILDERS
// ============================================================================

pub fn addr(value: &str) -> Address {
    parse_address(value).unwrap()
}

pub fn hash(value: &str) -> H256 {
    parse_h256(value).unwrap()
}

pub fn create_test_chain(chain_id: u64, name: &str, rpc_url: &str) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        name: name.to_string(),
        rpc_endpoint: rpc_url.parse().unwrap(),
        native_decimals: 18,
    }
}

/// Registry with chain X and chain Y
pub fn create_test_registry() -> ChainRegistry {
    ChainRegistry::new(vec![
        create_test_chain(DUMMY_CHAIN_X, "Base Sepolia", "http://127.0.0.1:8545"),
        create_test_chain(DUMMY_CHAIN_Y, "Arbitrum Sepolia", "http://127.0.0.1:8546"),
    ])
    .unwrap()
}

/// Same factory and init code on both chains, account index 0
pub fn create_test_factory() -> FactoryConfig {
    create_factory_with(DUMMY_FACTORY_ADDR, 0)
}

pub fn create_factory_with(factory: &str, account_index: u64) -> FactoryConfig {
    FactoryConfig::new(
        account_index,
        [DUMMY_CHAIN_X, DUMMY_CHAIN_Y]
            .into_iter()
            .map(|chain_id| FactoryDeployment {
                chain_id,
                factory: addr(factory),
                init_code_hash: hash(DUMMY_INIT_CODE_HASH),
            })
            .collect(),
    )
}

/// USDC (6 decimals) on chain X and chain Y
pub fn create_test_usdc() -> TokenMapping {
    TokenMapping::new(
        "USDC",
        6,
        vec![
            (DUMMY_CHAIN_X, addr(DUMMY_USDC_ADDR_X)),
            (DUMMY_CHAIN_Y, addr(DUMMY_USDC_ADDR_Y)),
        ],
    )
    .unwrap()
}

pub fn create_test_tokens() -> TokenMappingTable {
    TokenMappingTable::new(vec![create_test_usdc()]).unwrap()
}

/// Fast policies: no backoff, no polling delay
pub fn create_test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        default_gas_limit: DUMMY_GAS_LIMIT,
        execution_mode: ExecutionMode::Direct,
        retry: create_test_retry(3),
        polling_interval: Duration::ZERO,
        max_status_polls: 5,
    }
}

pub fn create_test_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::ZERO,
    }
}

pub fn test_signer() -> Arc<CountingSigner> {
    Arc::new(CountingSigner::new(&DUMMY_PRIVATE_KEY))
}

/// Orchestrator over in-memory chains and relay
pub fn create_test_orchestrator(
    chains: Vec<Arc<MockChain>>,
    relay: Arc<MockRelay>,
    signer: Arc<CountingSigner>,
) -> Orchestrator {
    let clients = chains
        .into_iter()
        .map(|c| c as Arc<dyn ChainRpc>)
        .collect();
    Orchestrator::new(
        create_test_registry(),
        create_test_tokens(),
        create_test_factory(),
        signer,
        relay,
        BalanceAggregator::new(clients).unwrap(),
        create_test_settings(),
    )
    .unwrap()
}

pub fn chain_execution(chain_id: u64, status: ChainExecutionStatus) -> ChainExecution {
    ChainExecution {
        chain_id,
        status,
        tx_hash: None,
        reason: match status {
            ChainExecutionStatus::Failed => Some("execution reverted".to_string()),
            _ => None,
        },
    }
}

pub fn execution_status(chains: Vec<ChainExecution>) -> ExecutionStatus {
    ExecutionStatus {
        aggregate_hash: hash(DUMMY_AGGREGATE_HASH),
        chains,
    }
}

// ============================================================================
// CHAIN DOUBLE
// ============================================================================

/// In-memory chain answering balance reads.
///
/// Every `read_contract` call is treated as `balanceOf` and answered with
/// `token_balance`; `fail` makes every call return a network error.
pub struct MockChain {
    pub chain_id: u64,
    pub native_balance: U256,
    pub token_balance: U256,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockChain {
    pub fn new(chain_id: u64, native_balance: u64, token_balance: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            native_balance: U256::from(native_balance),
            token_balance: U256::from(token_balance),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            native_balance: U256::zero(),
            token_balance: U256::zero(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_token_balance(chain_id: u64, token_balance: U256) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            native_balance: U256::zero(),
            token_balance,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_native_balance(&self, _address: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrchestratorError::Network("connection refused".to_string()));
        }
        Ok(self.native_balance)
    }

    async fn read_contract(&self, _contract: Address, _calldata: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrchestratorError::Network("connection refused".to_string()));
        }
        let mut word = [0u8; 32];
        self.token_balance.to_big_endian(&mut word);
        Ok(word.to_vec())
    }
}

// ============================================================================
// RELAY DOUBLE
// ============================================================================

/// Scripted relay.
///
/// Quotes echo the requested supertransaction with a fresh hash per call.
/// Queued errors are returned first; once a queue is empty the call succeeds.
/// Status reports are served in order, the last one repeating.
#[derive(Default)]
pub struct MockRelay {
    pub quote_errors: Mutex<VecDeque<OrchestratorError>>,
    pub execute_errors: Mutex<VecDeque<OrchestratorError>>,
    pub statuses: Mutex<VecDeque<ExecutionStatus>>,
    pub quote_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    /// (quote hash, wire signature) of every execute call
    pub executed: Mutex<Vec<(H256, String)>>,
}

impl MockRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_quote_error(&self, err: OrchestratorError) {
        self.quote_errors.lock().unwrap().push_back(err);
    }

    pub fn push_execute_error(&self, err: OrchestratorError) {
        self.execute_errors.lock().unwrap().push_back(err);
    }

    pub fn push_status(&self, status: ExecutionStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn quote_count(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(H256, String)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayApi for MockRelay {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let n = self.quote_calls.fetch_add(1, Ordering::SeqCst) as u64;
        if let Some(err) = self.quote_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Quote {
            hash: H256::from_low_u64_be(0x1000 + n),
            fee: FeeBreakdown {
                fee_token: request.supertransaction.fee_token(),
                amount: U256::from(DUMMY_FEE_AMOUNT),
                per_chain: vec![],
            },
            supertransaction: request.supertransaction.clone(),
            expires_at: None,
        })
    }

    async fn execute(&self, execution: &SignedExecution) -> Result<ExecutionHandle> {
        self.executed
            .lock()
            .unwrap()
            .push((execution.quote_hash(), execution.wire_signature()));
        if let Some(err) = self.execute_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(ExecutionHandle {
            aggregate_hash: hash(DUMMY_AGGREGATE_HASH),
        })
    }

    async fn status(&self, _handle: &ExecutionHandle) -> Result<ExecutionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            return Ok(statuses.pop_front().unwrap());
        }
        statuses
            .front()
            .cloned()
            .ok_or_else(|| OrchestratorError::Network("no status scripted".to_string()))
    }
}

// ============================================================================
// SIGNER DOUBLE
// ============================================================================

/// Local signer that counts how many digests it signed.
pub struct CountingSigner {
    inner: LocalSigner,
    pub calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new(private_key: &[u8; 32]) -> Self {
        Self {
            inner: LocalSigner::from_bytes(private_key).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sign_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_digest(&self, digest: H256) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_digest(digest).await
    }
}
