use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, ChainId, B256};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use batua_core::{
    hex_chain_id, Account, ActionContext, BackendActions, BatchHandle, Call, CallReceipt,
    CallsStatus, NetworkClient, PortError,
};

use crate::config::AdapterConfig;
use crate::network::{HttpNetworkClient, NetworkClients};

/// Offline smart-account backend.
///
/// Accounts and batch handles are derived by hashing, so identical inputs
/// give identical results across runs. A batch reports pending for the
/// configured number of status queries and then confirms with a single
/// receipt whose hash is `keccak256(handle)`.
#[derive(Debug, Clone)]
pub struct DeterministicBackend {
    clients: NetworkClients,
    accounts: Vec<Account>,
    pending_polls: u32,
    state: Arc<Mutex<BackendState>>,
}

#[derive(Debug, Default)]
struct BackendState {
    nonce: u64,
    batches: HashMap<BatchHandle, BatchRecord>,
}

#[derive(Debug)]
struct BatchRecord {
    chain_id: ChainId,
    calls: usize,
    polls: u32,
}

impl DeterministicBackend {
    pub fn new(clients: NetworkClients, account_count: usize, pending_polls: u32) -> Self {
        Self {
            clients,
            accounts: (0..account_count).map(deterministic_account).collect(),
            pending_polls,
            state: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, PortError> {
        Ok(Self::new(
            NetworkClients::from_config(config)?,
            config.deterministic_account_count,
            config.deterministic_pending_polls,
        ))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BackendState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("backend lock poisoned: {e}")))
    }
}

#[async_trait(?Send)]
impl BackendActions for DeterministicBackend {
    type Client = HttpNetworkClient;

    fn resolve_client(&self, chain_id: ChainId) -> Result<HttpNetworkClient, PortError> {
        self.clients.resolve(chain_id)
    }

    async fn load_accounts(
        &self,
        ctx: ActionContext<'_, HttpNetworkClient>,
    ) -> Result<Vec<Account>, PortError> {
        debug!(
            chain_id = ctx.client.chain_id(),
            count = self.accounts.len(),
            "loading deterministic accounts"
        );
        Ok(self.accounts.clone())
    }

    async fn send_calls(
        &self,
        ctx: ActionContext<'_, HttpNetworkClient>,
        account: &Account,
        calls: &[Call],
        capabilities: Option<&Map<String, Value>>,
    ) -> Result<BatchHandle, PortError> {
        if calls.is_empty() {
            return Err(PortError::Validation("batch has no calls".to_owned()));
        }
        if !self.accounts.iter().any(|a| a.address == account.address) {
            return Err(PortError::NotFound(format!("account {}", account.address)));
        }
        if let Some(capabilities) = capabilities {
            debug!(
                capabilities = ?capabilities.keys().collect::<Vec<_>>(),
                "capabilities accepted"
            );
        }

        let chain_id = ctx.client.chain_id();
        let mut g = self.lock()?;
        g.nonce = g.nonce.saturating_add(1);
        let handle = batch_handle(chain_id, account.address, calls, g.nonce);
        g.batches.insert(
            handle.clone(),
            BatchRecord {
                chain_id,
                calls: calls.len(),
                polls: 0,
            },
        );
        info!(%handle, chain_id, calls = calls.len(), sender = %account.address, "batch accepted");
        Ok(handle)
    }

    async fn get_calls_status(
        &self,
        _ctx: ActionContext<'_, HttpNetworkClient>,
        handle: &BatchHandle,
        timeout: Option<Duration>,
    ) -> Result<CallsStatus, PortError> {
        let mut g = self.lock()?;
        let record = g
            .batches
            .get_mut(handle)
            .ok_or_else(|| PortError::NotFound(format!("batch {handle}")))?;
        record.polls = record.polls.saturating_add(1);
        debug!(%handle, polls = record.polls, ?timeout, "status query");

        let mut status = if record.polls <= self.pending_polls {
            CallsStatus::pending()
        } else {
            CallsStatus::confirmed(vec![CallReceipt::new(keccak256(&handle.0))])
        };
        status
            .extra
            .insert("chainId".to_owned(), json!(hex_chain_id(record.chain_id)));
        status
            .extra
            .insert("atomic".to_owned(), json!(record.calls > 1));
        Ok(status)
    }
}

fn deterministic_account(index: usize) -> Account {
    let seed = keccak256(format!("batua:deterministic-account:{index}"));
    Account::new(Address::from_slice(&seed[12..]))
}

fn batch_handle(chain_id: ChainId, sender: Address, calls: &[Call], nonce: u64) -> BatchHandle {
    let mut seed = Vec::new();
    seed.extend_from_slice(&chain_id.to_be_bytes());
    seed.extend_from_slice(sender.as_slice());
    for call in calls {
        seed.extend_from_slice(call.to.as_slice());
        seed.extend_from_slice(&call.value.unwrap_or_default().to_be_bytes::<32>());
        if let Some(data) = &call.data {
            seed.extend_from_slice(data);
        }
    }
    seed.extend_from_slice(&nonce.to_be_bytes());
    let hash: B256 = keccak256(seed);
    BatchHandle(Bytes::copy_from_slice(hash.as_slice()))
}
