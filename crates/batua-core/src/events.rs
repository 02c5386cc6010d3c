//! Provider events and the bridge from store changes to them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;
use serde_json::{json, Value};

use crate::domain::{hex_chain_id, StateSlice, WalletState};
use crate::ports::{PortError, StateStore, SubscriptionId};

pub const CONNECT: &str = "connect";
pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
pub const CHAIN_CHANGED: &str = "chainChanged";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Hex chain id of the client the first connection was made through.
    Connect { chain_id: String },
    /// Empty when every account has been disconnected.
    AccountsChanged(Vec<Address>),
    ChainChanged(String),
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => CONNECT,
            Self::AccountsChanged(_) => ACCOUNTS_CHANGED,
            Self::ChainChanged(_) => CHAIN_CHANGED,
        }
    }

    pub fn data(&self) -> Value {
        match self {
            Self::Connect { chain_id } => json!({ "chainId": chain_id }),
            Self::AccountsChanged(accounts) => json!(accounts),
            Self::ChainChanged(chain_id) => json!(chain_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type EventListener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

#[derive(Default)]
struct EmitterState {
    next_id: u64,
    listeners: Vec<(ListenerId, EventListener)>,
}

/// Observer list for [`ProviderEvent`]s. Cloning shares the listener list.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<Mutex<EmitterState>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventEmitter {
    pub fn on(&self, listener: impl Fn(&ProviderEvent) + Send + Sync + 'static) -> ListenerId {
        let mut g = self.lock();
        g.next_id = g.next_id.saturating_add(1);
        let id = ListenerId(g.next_id);
        g.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut g = self.lock();
        let before = g.listeners.len();
        g.listeners.retain(|(x, _)| *x != id);
        g.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Listeners run outside the lock, in registration order.
    pub fn emit(&self, event: &ProviderEvent) {
        let listeners: Vec<EventListener> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        // listeners never run under this lock, so a poisoned list is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Subscribes `emitter` to the accounts and chain slices of `store`.
///
/// On failure nothing stays subscribed.
pub fn bridge_store_events<S: StateStore>(
    store: &S,
    emitter: &EventEmitter,
) -> Result<Vec<SubscriptionId>, PortError> {
    let accounts_emitter = emitter.clone();
    let accounts = store.subscribe(
        StateSlice::Accounts,
        Box::new(move |state: &WalletState| {
            accounts_emitter.emit(&ProviderEvent::AccountsChanged(state.addresses()));
        }),
    )?;

    let chain_emitter = emitter.clone();
    let chain = store.subscribe(
        StateSlice::Chain,
        Box::new(move |state: &WalletState| {
            chain_emitter.emit(&ProviderEvent::ChainChanged(hex_chain_id(state.chain.id)));
        }),
    );
    match chain {
        Ok(chain) => Ok(vec![accounts, chain]),
        Err(e) => {
            let _ = store.unsubscribe(accounts);
            Err(e)
        }
    }
}
