//! Execution Tracker
//!
//! Polls the relay for the per-chain status of a submitted supertransaction
//! until every chain reaches a terminal state.
//!
//! The relay is not assumed to execute a supertransaction atomically: chains
//! confirm or fail independently. A single failed chain makes the aggregate
//! outcome `Failed`, and the report always keeps the full per-chain
//! breakdown so partial on-chain effects stay visible.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::relay_client::{ChainExecution, ChainExecutionStatus, ExecutionHandle, RelayApi};
use crate::service::retry::{with_retry, RetryPolicy};

/// Aggregate outcome of a supertransaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every chain operation confirmed
    Confirmed,
    /// At least one chain operation failed
    Failed,
}

/// Final per-chain result of a supertransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub handle: ExecutionHandle,
    pub chains: Vec<ChainExecution>,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    /// Per-chain entries follow `expected` order; chains the relay reports
    /// outside `expected` are dropped. An empty `expected` keeps the relay's
    /// entries as reported.
    fn from_chains(handle: ExecutionHandle, reported: Vec<ChainExecution>, expected: &[u64]) -> Self {
        let chains = if expected.is_empty() {
            reported
        } else {
            expected
                .iter()
                .filter_map(|id| reported.iter().find(|c| c.chain_id == *id).cloned())
                .collect()
        };
        let outcome = if chains
            .iter()
            .all(|c| c.status == ChainExecutionStatus::Confirmed)
        {
            ExecutionOutcome::Confirmed
        } else {
            ExecutionOutcome::Failed
        };
        Self {
            handle,
            chains,
            outcome,
        }
    }

    pub fn status_of(&self, chain_id: u64) -> Option<ChainExecutionStatus> {
        self.chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .map(|c| c.status)
    }

    pub fn failed_chains(&self) -> Vec<u64> {
        self.chains
            .iter()
            .filter(|c| c.status == ChainExecutionStatus::Failed)
            .map(|c| c.chain_id)
            .collect()
    }

    /// One-line per-chain summary, e.g. `84532: confirmed, 421614: failed (reverted)`.
    pub fn summary(&self) -> String {
        self.chains
            .iter()
            .map(|c| {
                let status = match c.status {
                    ChainExecutionStatus::Pending => "pending",
                    ChainExecutionStatus::Submitted => "submitted",
                    ChainExecutionStatus::Confirmed => "confirmed",
                    ChainExecutionStatus::Failed => "failed",
                };
                match &c.reason {
                    Some(reason) => format!("{}: {} ({})", c.chain_id, status, reason),
                    None => format!("{}: {}", c.chain_id, status),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `Ok` when every chain confirmed, otherwise `PartialExecutionFailure`
    /// carrying this report.
    pub fn into_result(self) -> Result<ExecutionReport> {
        match self.outcome {
            ExecutionOutcome::Confirmed => Ok(self),
            ExecutionOutcome::Failed => Err(OrchestratorError::PartialExecutionFailure(Box::new(self))),
        }
    }
}

pub struct ExecutionTracker {
    relay: Arc<dyn RelayApi>,
    polling_interval: Duration,
    max_polls: u32,
    retry: RetryPolicy,
}

impl ExecutionTracker {
    pub fn new(
        relay: Arc<dyn RelayApi>,
        polling_interval: Duration,
        max_polls: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            relay,
            polling_interval,
            max_polls,
            retry,
        }
    }

    /// Polls until every chain in `expected_chains` is terminal.
    ///
    /// With an empty `expected_chains`, waits until the relay reports at least
    /// one chain and all reported chains are terminal. Transient network
    /// failures while polling are retried under the retry policy.
    pub async fn track(
        &self,
        handle: &ExecutionHandle,
        expected_chains: &[u64],
    ) -> Result<ExecutionReport> {
        for poll in 1..=self.max_polls {
            let status = with_retry(&self.retry, "execution status", || self.relay.status(handle)).await?;

            if is_complete(&status.chains, expected_chains) {
                let unexpected: Vec<u64> = status
                    .chains
                    .iter()
                    .map(|c| c.chain_id)
                    .filter(|id| !expected_chains.is_empty() && !expected_chains.contains(id))
                    .collect();
                if !unexpected.is_empty() {
                    warn!(
                        "Relay reported chain(s) {:?} outside supertransaction {:?}; ignoring",
                        unexpected, handle.aggregate_hash
                    );
                }
                let report = ExecutionReport::from_chains(*handle, status.chains, expected_chains);
                match report.outcome {
                    ExecutionOutcome::Confirmed => {
                        info!("Supertransaction {:?} confirmed on all chains", handle.aggregate_hash)
                    }
                    ExecutionOutcome::Failed => warn!(
                        "Supertransaction {:?} failed: {}",
                        handle.aggregate_hash,
                        report.summary()
                    ),
                }
                return Ok(report);
            }

            debug!(
                "Supertransaction {:?} not final after poll {}/{}",
                handle.aggregate_hash, poll, self.max_polls
            );
            if poll < self.max_polls {
                tokio::time::sleep(self.polling_interval).await;
            }
        }

        Err(OrchestratorError::TrackingTimeout {
            aggregate_hash: handle.aggregate_hash,
            polls: self.max_polls,
        })
    }
}

fn is_complete(chains: &[ChainExecution], expected: &[u64]) -> bool {
    if chains.is_empty() {
        return false;
    }
    let all_reported_terminal = chains.iter().all(|c| c.status.is_terminal());
    let all_expected_present = expected
        .iter()
        .all(|id| chains.iter().any(|c| c.chain_id == *id));
    all_reported_terminal && all_expected_present
}
