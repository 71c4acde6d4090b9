//! Balance Aggregator
//!
//! Queries the smart account's balances on every requested chain
//! concurrently and folds them into a single snapshot. A snapshot is
//! all-or-nothing: if any chain fails, the whole aggregation fails, since a
//! missing chain would understate the total.

use ethereum_types::{Address, U256};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::abi::{decode_uint, encode_call, Token, ERC20_BALANCE_OF};
use crate::account::MultichainAccount;
use crate::chains::{ChainRegistry, ChainRpc, EvmRpcClient};
use crate::error::{OrchestratorError, Result};
use crate::tokens::TokenMapping;
use crate::units::format_units;

/// Token balance across chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedBalance {
    pub token: String,
    pub decimals: u8,
    /// Raw amounts in the order the chains were requested
    pub per_chain: Vec<(u64, U256)>,
    /// Exact sum of `per_chain`
    pub total: U256,
}

impl UnifiedBalance {
    pub fn on_chain(&self, chain_id: u64) -> Option<U256> {
        self.per_chain
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, amount)| *amount)
    }

    /// Total formatted with the token's decimals (e.g. "0.4").
    pub fn formatted_total(&self) -> String {
        format_units(self.total, self.decimals)
    }
}

/// Native currency balance on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBalance {
    pub chain_id: u64,
    pub amount: U256,
    pub decimals: u8,
}

impl NativeBalance {
    pub fn formatted(&self) -> String {
        format_units(self.amount, self.decimals)
    }
}

pub struct BalanceAggregator {
    clients: HashMap<u64, Arc<dyn ChainRpc>>,
}

impl BalanceAggregator {
    /// Builds an aggregator over injected chain clients, one per chain.
    pub fn new(clients: Vec<Arc<dyn ChainRpc>>) -> Result<Self> {
        let mut map = HashMap::with_capacity(clients.len());
        for client in clients {
            let chain_id = client.chain_id();
            if map.insert(chain_id, client).is_some() {
                return Err(OrchestratorError::Configuration(format!(
                    "more than one RPC client for chain {}",
                    chain_id
                )));
            }
        }
        Ok(Self { clients: map })
    }

    /// Builds one JSON-RPC client per registered chain.
    pub fn from_registry(registry: &ChainRegistry, timeout: Duration) -> Result<Self> {
        let clients = registry
            .iter()
            .map(|chain| Ok(Arc::new(EvmRpcClient::new(chain, timeout)?) as Arc<dyn ChainRpc>))
            .collect::<Result<Vec<_>>>()?;
        Self::new(clients)
    }

    fn client(&self, chain_id: u64) -> Result<Arc<dyn ChainRpc>> {
        self.clients.get(&chain_id).cloned().ok_or_else(|| {
            OrchestratorError::Configuration(format!("no RPC client for chain {}", chain_id))
        })
    }

    /// Unified `token` balance of the account over `chains`.
    ///
    /// All lookups are resolved before any request is sent, so configuration
    /// problems never reach the network.
    pub async fn unified_balance(
        &self,
        account: &MultichainAccount,
        mapping: &TokenMapping,
        chains: &[u64],
    ) -> Result<UnifiedBalance> {
        check_chain_list(chains)?;

        let mut targets = Vec::with_capacity(chains.len());
        for &chain_id in chains {
            let client = self.client(chain_id)?;
            let holder = account.address_on(chain_id)?;
            let contract = mapping.address_on(chain_id)?;
            targets.push((chain_id, client, holder, contract));
        }

        debug!(
            "Querying {} balance on {} chain(s) for {:?}",
            mapping.symbol(),
            targets.len(),
            account.owner()
        );

        let per_chain = try_join_all(targets.into_iter().map(
            |(chain_id, client, holder, contract)| async move {
                let amount = token_balance(client.as_ref(), contract, holder).await?;
                Ok::<_, OrchestratorError>((chain_id, amount))
            },
        ))
        .await?;

        let total = per_chain.iter().try_fold(U256::zero(), |acc, (_, amount)| {
            acc.checked_add(*amount)
                .ok_or_else(|| OrchestratorError::BalanceOverflow(mapping.symbol().to_string()))
        })?;

        info!(
            "Unified {} balance: {} ({} chain(s))",
            mapping.symbol(),
            format_units(total, mapping.decimals()),
            per_chain.len()
        );

        Ok(UnifiedBalance {
            token: mapping.symbol().to_string(),
            decimals: mapping.decimals(),
            per_chain,
            total,
        })
    }

    /// Native balances of the account on `chains`, in request order.
    pub async fn native_balances(
        &self,
        account: &MultichainAccount,
        registry: &ChainRegistry,
        chains: &[u64],
    ) -> Result<Vec<NativeBalance>> {
        check_chain_list(chains)?;

        let mut targets = Vec::with_capacity(chains.len());
        for &chain_id in chains {
            let decimals = registry.require(chain_id)?.native_decimals;
            let client = self.client(chain_id)?;
            let holder = account.address_on(chain_id)?;
            targets.push((chain_id, decimals, client, holder));
        }

        try_join_all(targets.into_iter().map(
            |(chain_id, decimals, client, holder)| async move {
                let amount = client
                    .get_native_balance(holder)
                    .await
                    .map_err(|e| annotate(e, chain_id))?;
                Ok::<_, OrchestratorError>(NativeBalance {
                    chain_id,
                    amount,
                    decimals,
                })
            },
        ))
        .await
    }
}

async fn token_balance(client: &dyn ChainRpc, contract: Address, holder: Address) -> Result<U256> {
    let chain_id = client.chain_id();
    let calldata = encode_call(ERC20_BALANCE_OF, &[Token::Address(holder)]);
    let data = client
        .read_contract(contract, &calldata)
        .await
        .map_err(|e| annotate(e, chain_id))?;
    decode_uint(&data).map_err(|e| annotate(e, chain_id))
}

/// Adds the failing chain to network error messages.
fn annotate(err: OrchestratorError, chain_id: u64) -> OrchestratorError {
    match err {
        OrchestratorError::Network(msg) if !msg.contains(&format!("chain {}", chain_id)) => {
            OrchestratorError::Network(format!("chain {}: {}", chain_id, msg))
        }
        other => other,
    }
}

fn check_chain_list(chains: &[u64]) -> Result<()> {
    if chains.is_empty() {
        return Err(OrchestratorError::Validation(
            "at least one chain must be queried".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for chain_id in chains {
        if !seen.insert(*chain_id) {
            return Err(OrchestratorError::DuplicateChain(*chain_id));
        }
    }
    Ok(())
}
