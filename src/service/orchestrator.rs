//! Orchestrator
//!
//! Top-level entry point coordinating balance aggregation and supertransaction
//! submission for one multichain account. Every call starts a fresh cycle
//! from immutable inputs; the only state carried between calls is the cached
//! account address mapping.

use ethereum_types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::account::{FactoryConfig, MultichainAccount};
use crate::balance::{BalanceAggregator, NativeBalance, UnifiedBalance};
use crate::chains::ChainRegistry;
use crate::config::OrchestratorConfig;
use crate::crypto::Signer;
use crate::error::{OrchestratorError, Result};
use crate::operation::{CallIntent, ChainOperation, OperationBuilder};
use crate::relay_client::{AccountDeployment, ExecutionHandle, QuoteRequest, RelayApi, RelayClient};
use crate::service::retry::{with_retry, RetryPolicy};
use crate::service::submission::{ExecutionMode, Submission, SubmissionState};
use crate::service::tracker::{ExecutionReport, ExecutionTracker};
use crate::supertransaction::{assemble, FeeToken, Supertransaction};
use crate::tokens::TokenMappingTable;

/// How many times an expired quote is renewed within one submit call.
const MAX_QUOTE_RENEWALS: u32 = 1;

/// Tunables for the orchestrator's policies.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_gas_limit: u64,
    pub execution_mode: ExecutionMode,
    pub retry: RetryPolicy,
    pub polling_interval: Duration,
    pub max_status_polls: u32,
}

impl OrchestratorSettings {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            default_gas_limit: config.service.default_gas_limit,
            execution_mode: config.service.execution_mode,
            retry: RetryPolicy::from(&config.retry),
            polling_interval: Duration::from_millis(config.service.polling_interval_ms),
            max_status_polls: config.service.max_status_polls,
        }
    }
}

/// Transfer `token` to `recipient` from the account on several chains at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token: String,
    pub recipient: Address,
    /// Raw amount to send from each chain, one entry per chain
    pub amounts: Vec<(u64, U256)>,
    /// Chain whose deployment of `token` pays the relay fee
    pub fee_chain: u64,
}

/// Consistent snapshot of the account across chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub owner: Address,
    /// Account address per queried chain
    pub addresses: Vec<(u64, Address)>,
    pub native: Vec<NativeBalance>,
    pub token: UnifiedBalance,
}

pub struct Orchestrator {
    registry: ChainRegistry,
    tokens: TokenMappingTable,
    factory: FactoryConfig,
    account: MultichainAccount,
    signer: Arc<dyn Signer>,
    relay: Arc<dyn RelayApi>,
    balances: BalanceAggregator,
    tracker: ExecutionTracker,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Creates an orchestrator from explicitly constructed collaborators.
    ///
    /// Derives the account addresses once and checks that every token
    /// mapping references registered chains where the account has an address.
    pub fn new(
        registry: ChainRegistry,
        tokens: TokenMappingTable,
        factory: FactoryConfig,
        signer: Arc<dyn Signer>,
        relay: Arc<dyn RelayApi>,
        balances: BalanceAggregator,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        tokens.check_against(&registry)?;
        let account = MultichainAccount::derive(signer.address(), &registry, &factory)?;
        tokens.check_account(&account)?;

        let tracker = ExecutionTracker::new(
            relay.clone(),
            settings.polling_interval,
            settings.max_status_polls,
            settings.retry.clone(),
        );

        Ok(Self {
            registry,
            tokens,
            factory,
            account,
            signer,
            relay,
            balances,
            tracker,
            settings,
        })
    }

    /// Wires JSON-RPC chain clients and the HTTP relay client from configuration.
    pub fn from_config(config: &OrchestratorConfig, signer: Arc<dyn Signer>) -> Result<Self> {
        let timeout = Duration::from_millis(config.service.request_timeout_ms);
        let registry = config.chain_registry()?;
        let balances = BalanceAggregator::from_registry(&registry, timeout)?;
        let relay: Arc<dyn RelayApi> = Arc::new(RelayClient::new(&config.service.relay_url, timeout)?);

        Self::new(
            registry,
            config.token_table()?,
            config.factory_config()?,
            signer,
            relay,
            balances,
            OrchestratorSettings::from_config(config),
        )
    }

    pub fn account(&self) -> &MultichainAccount {
        &self.account
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenMappingTable {
        &self.tokens
    }

    pub fn factory_config(&self) -> &FactoryConfig {
        &self.factory
    }

    /// Replaces the factory configuration, re-deriving account addresses only
    /// if it actually changed.
    pub fn update_factory_config(&mut self, factory: FactoryConfig) -> Result<()> {
        if self.account.is_derived_from(&factory) {
            return Ok(());
        }
        let account = MultichainAccount::derive(self.signer.address(), &self.registry, &factory)?;
        self.tokens.check_account(&account)?;
        info!("Factory configuration changed; account addresses re-derived");
        self.account = account;
        self.factory = factory;
        Ok(())
    }

    /// Snapshot of native and `token` balances on `chains`.
    ///
    /// An empty `chains` means every chain the token is mapped on. The
    /// snapshot is all-or-nothing; network failures retry the whole snapshot.
    pub async fn refresh_view(&self, chains: &[u64], token: &str) -> Result<AccountView> {
        let mapping = self.tokens.mapping(token)?;
        let chains = if chains.is_empty() {
            mapping.chains()
        } else {
            chains.to_vec()
        };

        // Resolve everything up front so a bad chain never reaches the network
        let addresses = chains
            .iter()
            .map(|&chain_id| {
                self.registry.require(chain_id)?;
                mapping.address_on(chain_id)?;
                Ok((chain_id, self.account.address_on(chain_id)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let chains = chains.as_slice();
        let (balances, account, registry) = (&self.balances, &self.account, &self.registry);
        let (native, unified) = with_retry(&self.settings.retry, "refresh view", || async move {
            futures::try_join!(
                balances.native_balances(account, registry, chains),
                balances.unified_balance(account, mapping, chains),
            )
        })
        .await?;

        Ok(AccountView {
            owner: self.account.owner(),
            addresses,
            native,
            token: unified,
        })
    }

    /// Builds and assembles the supertransaction for a transfer without
    /// touching the network.
    pub fn build_supertransaction(&self, request: &TransferRequest) -> Result<Supertransaction> {
        let builder = OperationBuilder::new(&self.tokens, self.settings.default_gas_limit);

        let operations = request
            .amounts
            .iter()
            .map(|&(chain_id, amount)| {
                builder.build_operation(
                    chain_id,
                    &[CallIntent::token_transfer(&request.token, request.recipient, amount)],
                )
            })
            .collect::<Result<Vec<ChainOperation>>>()?;

        let fee_token = FeeToken {
            chain_id: request.fee_chain,
            token_address: self.tokens.address_for(&request.token, request.fee_chain)?,
        };

        assemble(operations, fee_token)
    }

    /// Builds, quotes, signs and submits a transfer; returns the tracking handle.
    ///
    /// Each call starts a fresh cycle. If the relay stays unreachable after
    /// signing, the error is `ExecutionPending` carrying the signed
    /// submission; pass it to [`Orchestrator::resume_submission`] to retry
    /// the same signature instead of calling this again.
    pub async fn submit_transfer(&self, request: &TransferRequest) -> Result<ExecutionHandle> {
        let submission = self.run_submission(request).await?;
        submitted_handle(&submission)
    }

    /// Resubmits a submission handed back in `ExecutionPending` without re-signing.
    pub async fn resume_submission(&self, submission: Submission) -> Result<ExecutionHandle> {
        if submission.state() != SubmissionState::Signed {
            return Err(OrchestratorError::InvalidState {
                expected: "Signed",
                actual: submission.state().as_str(),
            });
        }
        info!("Resuming signed submission");
        let submission = self.drive(submission).await?;
        submitted_handle(&submission)
    }

    /// Polls a submitted supertransaction until every chain is terminal.
    pub async fn await_execution(
        &self,
        handle: &ExecutionHandle,
        expected_chains: &[u64],
    ) -> Result<ExecutionReport> {
        self.tracker.track(handle, expected_chains).await
    }

    /// Submits a transfer and waits for the per-chain outcome.
    ///
    /// Any failed chain yields `PartialExecutionFailure` with the full report.
    pub async fn transfer_and_wait(&self, request: &TransferRequest) -> Result<ExecutionReport> {
        let mut submission = self.run_submission(request).await?;
        submission.await_completion(&self.tracker).await?.into_result()
    }

    async fn run_submission(&self, request: &TransferRequest) -> Result<Submission> {
        let supertransaction = self.build_supertransaction(request)?;

        let accounts = supertransaction
            .chain_ids()
            .into_iter()
            .map(|chain_id| {
                Ok(AccountDeployment {
                    chain_id,
                    address: self.account.address_on(chain_id)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Submitting {} transfer to {:?} on chain(s) {:?} (fee on chain {})",
            request.token,
            request.recipient,
            supertransaction.chain_ids(),
            request.fee_chain
        );

        let submission = Submission::new(QuoteRequest {
            owner: self.account.owner(),
            accounts,
            supertransaction,
        });

        self.drive(submission).await
    }

    /// Runs quote/sign/submit from `Built`, or submit only from `Signed`.
    async fn drive(&self, mut submission: Submission) -> Result<Submission> {
        let retry = &self.settings.retry;
        let mut renewals = 0;
        loop {
            if submission.state() == SubmissionState::Built {
                submission.request_quote(self.relay.as_ref(), retry).await?;
                submission
                    .sign(self.signer.as_ref(), self.settings.execution_mode)
                    .await?;
            }
            let result = submission.submit(self.relay.as_ref(), retry).await;
            match result {
                Ok(_) => return Ok(submission),
                Err(OrchestratorError::QuoteExpired(hash)) if renewals < MAX_QUOTE_RENEWALS => {
                    renewals += 1;
                    info!("Quote {} expired; requesting a fresh quote", hash);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Relay unreachable after retries; keeping signed submission: {}", e);
                    return Err(OrchestratorError::ExecutionPending {
                        submission: Box::new(submission),
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn submitted_handle(submission: &Submission) -> Result<ExecutionHandle> {
    submission.handle().ok_or(OrchestratorError::InvalidState {
        expected: "Submitted",
        actual: submission.state().as_str(),
    })
}
