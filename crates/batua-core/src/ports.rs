use std::time::Duration;

use alloy::primitives::ChainId;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{
    Account, BatchHandle, Call, CallsStatus, ProviderInfo, StateSlice, WalletState,
};
use crate::rpc::WalletRequest;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type StateListener = Box<dyn Fn(&WalletState) + Send + Sync>;

/// Owner of the connected accounts and the active chain.
///
/// Readers get snapshots; nothing holds the state across a suspension point.
pub trait StateStore {
    fn read(&self) -> Result<WalletState, PortError>;
    fn write(&self, updater: &mut dyn FnMut(&mut WalletState)) -> Result<(), PortError>;
    /// `on_change` runs after a write that changed `slice`, with the new state.
    fn subscribe(
        &self,
        slice: StateSlice,
        on_change: StateListener,
    ) -> Result<SubscriptionId, PortError>;
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError>;
}

/// JSON-RPC client bound to one chain.
#[async_trait(?Send)]
pub trait NetworkClient {
    fn chain_id(&self) -> ChainId;
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError>;
}

pub struct ActionContext<'a, N> {
    pub client: &'a N,
    pub request: &'a WalletRequest,
}

/// Smart-account backend: account loading, batch submission and status.
#[async_trait(?Send)]
pub trait BackendActions {
    type Client: NetworkClient;

    /// May fall back to another chain when `chain_id` is not served; the
    /// caller compares [`NetworkClient::chain_id`] against what it asked for.
    fn resolve_client(&self, chain_id: ChainId) -> Result<Self::Client, PortError>;

    async fn load_accounts(
        &self,
        ctx: ActionContext<'_, Self::Client>,
    ) -> Result<Vec<Account>, PortError>;

    async fn send_calls(
        &self,
        ctx: ActionContext<'_, Self::Client>,
        account: &Account,
        calls: &[Call],
        capabilities: Option<&Map<String, Value>>,
    ) -> Result<BatchHandle, PortError>;

    /// `timeout` bounds how long the backend may wait for the batch to land.
    async fn get_calls_status(
        &self,
        ctx: ActionContext<'_, Self::Client>,
        handle: &BatchHandle,
        timeout: Option<Duration>,
    ) -> Result<CallsStatus, PortError>;
}

#[async_trait(?Send)]
pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnouncementId(pub u64);

/// Advertises the provider to the host environment.
pub trait AnnouncerPort {
    fn announce(&self, info: &ProviderInfo) -> Result<AnnouncementId, PortError>;
    fn withdraw(&self, id: AnnouncementId) -> Result<(), PortError>;
}
