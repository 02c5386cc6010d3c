//! Request dispatcher: the wallet state machine behind the provider interface.

use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, ChainId, TxHash};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::domain::{
    capabilities_for, dedup_accounts, hex_chain_id, Account, BatchHandle, Capabilities,
    CallsStatus, WalletState,
};
use crate::error::ProviderError;
use crate::events::{bridge_store_events, EventEmitter, ListenerId, ProviderEvent};
use crate::poller::StatusPoller;
use crate::ports::{
    ActionContext, AnnouncementId, AnnouncerPort, BackendActions, ClockPort, NetworkClient,
    PortError, StateStore, SubscriptionId,
};
use crate::rpc::{
    is_wallet_namespace, parse_request, RpcRequest, SendCallsRequest, TransactionRequest,
    WalletRequest,
};

/// Typed result of a dispatched wallet request.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletResponse {
    Accounts(Vec<Address>),
    ChainId(String),
    Capabilities(Capabilities),
    TransactionHash(TxHash),
    BatchHandle(BatchHandle),
    CallsStatus(CallsStatus),
    Revoked,
}

impl WalletResponse {
    pub fn into_value(self) -> Result<Value, ProviderError> {
        let value = match self {
            Self::Accounts(accounts) => serde_json::to_value(accounts),
            Self::ChainId(chain_id) => Ok(Value::String(chain_id)),
            Self::Capabilities(capabilities) => serde_json::to_value(capabilities),
            Self::TransactionHash(hash) => serde_json::to_value(hash),
            Self::BatchHandle(handle) => serde_json::to_value(handle),
            Self::CallsStatus(status) => serde_json::to_value(status),
            Self::Revoked => Ok(Value::Null),
        };
        value.map_err(|e| {
            ProviderError::Backend(PortError::Validation(format!(
                "response serialization failed: {e}"
            )))
        })
    }
}

struct Attached {
    subscriptions: Vec<SubscriptionId>,
    announcement: Option<AnnouncementId>,
}

pub struct Provider<S, B, C>
where
    S: StateStore,
    B: BackendActions,
    C: ClockPort,
{
    pub store: S,
    pub backend: B,
    pub clock: C,
    config: ProviderConfig,
    emitter: EventEmitter,
    announcer: Option<Box<dyn AnnouncerPort>>,
    attached: Mutex<Option<Attached>>,
}

impl<S, B, C> Provider<S, B, C>
where
    S: StateStore,
    B: BackendActions,
    C: ClockPort,
{
    pub fn new(
        store: S,
        backend: B,
        clock: C,
        config: ProviderConfig,
    ) -> Result<Self, ProviderError> {
        Self::build(store, backend, clock, config, None)
    }

    /// Like [`Provider::new`], announcing the provider when the config asks for it.
    pub fn with_announcer(
        store: S,
        backend: B,
        clock: C,
        config: ProviderConfig,
        announcer: Box<dyn AnnouncerPort>,
    ) -> Result<Self, ProviderError> {
        Self::build(store, backend, clock, config, Some(announcer))
    }

    fn build(
        store: S,
        backend: B,
        clock: C,
        config: ProviderConfig,
        announcer: Option<Box<dyn AnnouncerPort>>,
    ) -> Result<Self, ProviderError> {
        let emitter = EventEmitter::default();
        let subscriptions = bridge_store_events(&store, &emitter)?;

        let announcement = match (&announcer, config.announce_provider) {
            (Some(announcer), true) => match announcer.announce(&config.info) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "provider announcement failed");
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            store,
            backend,
            clock,
            config,
            emitter,
            announcer,
            attached: Mutex::new(Some(Attached {
                subscriptions,
                announcement,
            })),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn on(&self, listener: impl Fn(&ProviderEvent) + Send + Sync + 'static) -> ListenerId {
        self.emitter.on(listener)
    }

    /// Entry point for raw requests.
    ///
    /// Unknown methods outside the `wallet_` namespace go to the network
    /// client of the active chain untouched.
    pub async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        let parsed = match parse_request(&request) {
            Ok(parsed) => parsed,
            Err(ProviderError::MethodNotSupported(method)) if !is_wallet_namespace(&method) => {
                return self.forward(request).await;
            }
            Err(e) => return Err(e),
        };
        self.dispatch(&parsed).await?.into_value()
    }

    pub async fn dispatch(&self, request: &WalletRequest) -> Result<WalletResponse, ProviderError> {
        debug!(method = request.method(), "dispatching wallet request");
        match request {
            WalletRequest::Accounts => {
                let state = self.connected_state()?;
                Ok(WalletResponse::Accounts(state.addresses()))
            }
            WalletRequest::ChainId => {
                let state = self.store.read()?;
                Ok(WalletResponse::ChainId(hex_chain_id(state.chain.id)))
            }
            WalletRequest::GetCapabilities => Ok(WalletResponse::Capabilities(
                capabilities_for(&self.config.chains),
            )),
            WalletRequest::RequestAccounts => self.request_accounts(request).await,
            WalletRequest::SendTransaction(tx) => self.send_transaction(request, tx).await,
            WalletRequest::SendCalls(params) => self.send_calls(request, params).await,
            WalletRequest::GetCallsStatus(handle) => {
                let state = self.connected_state()?;
                let client = self.backend.resolve_client(state.chain.id)?;
                let ctx = ActionContext {
                    client: &client,
                    request,
                };
                let status = self.backend.get_calls_status(ctx, handle, None).await?;
                Ok(WalletResponse::CallsStatus(status))
            }
            WalletRequest::RevokePermissions => {
                self.connected_state()?;
                self.store
                    .write(&mut |state: &mut WalletState| state.accounts.clear())?;
                info!("revoked all account permissions");
                Ok(WalletResponse::Revoked)
            }
        }
    }

    /// Tears down store subscriptions and the announcement. Safe to call repeatedly.
    pub fn destroy(&self) {
        let attached = self
            .attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(attached) = attached else {
            return;
        };
        for id in attached.subscriptions {
            if let Err(e) = self.store.unsubscribe(id) {
                warn!(error = %e, ?id, "failed to unsubscribe from store");
            }
        }
        if let (Some(id), Some(announcer)) = (attached.announcement, &self.announcer) {
            if let Err(e) = announcer.withdraw(id) {
                warn!(error = %e, "failed to withdraw provider announcement");
            }
        }
    }

    async fn request_accounts(
        &self,
        request: &WalletRequest,
    ) -> Result<WalletResponse, ProviderError> {
        let state = self.store.read()?;
        if state.is_connected() {
            return Ok(WalletResponse::Accounts(state.addresses()));
        }

        let client = self.backend.resolve_client(state.chain.id)?;
        let ctx = ActionContext {
            client: &client,
            request,
        };
        let accounts = dedup_accounts(self.backend.load_accounts(ctx).await?);
        if accounts.is_empty() {
            return Err(ProviderError::MalformedBackendResponse(
                "load_accounts returned no accounts".to_owned(),
            ));
        }

        self.store
            .write(&mut |state: &mut WalletState| state.accounts = accounts.clone())?;

        let chain_id = hex_chain_id(client.chain_id());
        info!(accounts = accounts.len(), %chain_id, "provider connected");
        self.emitter.emit(&ProviderEvent::Connect { chain_id });
        Ok(WalletResponse::Accounts(
            accounts.iter().map(|a| a.address).collect(),
        ))
    }

    async fn send_transaction(
        &self,
        request: &WalletRequest,
        tx: &TransactionRequest,
    ) -> Result<WalletResponse, ProviderError> {
        let state = self.connected_state()?;
        let client = self.resolve_client_for(&state, tx.chain_id)?;
        let account = authorize(&state, tx.from)?;

        let calls = [tx.to_call()];
        let handle = self
            .backend
            .send_calls(
                ActionContext {
                    client: &client,
                    request,
                },
                &account,
                &calls,
                None,
            )
            .await?;
        debug!(%handle, "legacy transaction submitted, waiting for receipt");

        let client = &client;
        let handle_ref = &handle;
        let backend = &self.backend;
        let hash = StatusPoller::new(&self.clock, self.config.poll)
            .wait_for_transaction_hash(handle_ref, move |timeout| {
                backend.get_calls_status(
                    ActionContext { client, request },
                    handle_ref,
                    Some(timeout),
                )
            })
            .await?;
        Ok(WalletResponse::TransactionHash(hash))
    }

    async fn send_calls(
        &self,
        request: &WalletRequest,
        params: &SendCallsRequest,
    ) -> Result<WalletResponse, ProviderError> {
        let state = self.connected_state()?;
        let from = params
            .from
            .or_else(|| state.accounts.first().map(|a| a.address))
            .ok_or(ProviderError::Disconnected)?;
        let client = self.resolve_client_for(&state, params.chain_id)?;
        let account = authorize(&state, from)?;

        let ctx = ActionContext {
            client: &client,
            request,
        };
        let handle = self
            .backend
            .send_calls(ctx, &account, &params.calls, params.capabilities.as_ref())
            .await?;
        debug!(%handle, calls = params.calls.len(), "batch submitted");
        Ok(WalletResponse::BatchHandle(handle))
    }

    async fn forward(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        let state = self.store.read()?;
        let client = self.backend.resolve_client(state.chain.id)?;
        debug!(method = %request.method, chain_id = client.chain_id(), "forwarding to network client");
        let params = request.params.unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(client.request(&request.method, params).await?)
    }

    fn connected_state(&self) -> Result<WalletState, ProviderError> {
        let state = self.store.read()?;
        if !state.is_connected() {
            return Err(ProviderError::Disconnected);
        }
        Ok(state)
    }

    fn resolve_client_for(
        &self,
        state: &WalletState,
        requested: Option<ChainId>,
    ) -> Result<B::Client, ProviderError> {
        let client = self
            .backend
            .resolve_client(requested.unwrap_or(state.chain.id))?;
        if let Some(requested) = requested {
            if requested != client.chain_id() {
                return Err(ProviderError::ChainDisconnected {
                    requested,
                    resolved: client.chain_id(),
                });
            }
        }
        Ok(client)
    }
}

impl<S, B, C> Drop for Provider<S, B, C>
where
    S: StateStore,
    B: BackendActions,
    C: ClockPort,
{
    fn drop(&mut self) {
        self.destroy();
    }
}

fn authorize(state: &WalletState, from: Address) -> Result<Account, ProviderError> {
    state
        .find_account(from)
        .copied()
        .ok_or(ProviderError::Unauthorized(from))
}
