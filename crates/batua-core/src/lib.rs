//! Batua provider core: parses wallet requests, enforces connection and
//! authorization rules, drives the smart-account backend and bridges store
//! changes to EIP-1193 events.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod poller;
pub mod ports;
pub mod provider;
pub mod rpc;

pub use config::{PollConfig, ProviderConfig};
pub use domain::{
    capabilities_for, dedup_accounts, hex_chain_id, parse_hex_chain_id, Account, BatchHandle,
    Call, CallReceipt, CallsStatus, Capabilities, Chain, ChainCapabilities, ProviderInfo,
    StateSlice, WalletState,
};
pub use error::{ErrorCode, ProviderError, RpcError};
pub use events::{EventEmitter, ListenerId, ProviderEvent};
pub use poller::StatusPoller;
pub use ports::{
    ActionContext, AnnouncementId, AnnouncerPort, BackendActions, ClockPort, NetworkClient,
    PortError, StateListener, StateStore, SubscriptionId,
};
pub use provider::{Provider, WalletResponse};
pub use rpc::{
    is_wallet_namespace, parse_request, RpcRequest, SendCallsRequest, TransactionRequest,
    WalletRequest,
};
