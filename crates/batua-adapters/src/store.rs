use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use batua_core::{
    dedup_accounts, Chain, PortError, StateListener, StateSlice, StateStore, SubscriptionId,
    WalletState,
};
use tracing::trace;

struct Subscription {
    slice: StateSlice,
    listener: Arc<StateListener>,
}

struct StoreInner {
    state: WalletState,
    next_id: u64,
    subscriptions: BTreeMap<u64, Subscription>,
}

/// Process-local wallet state with slice subscriptions.
///
/// Listeners run after the write has been committed and the lock released,
/// so they may read or write the store again.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl InMemoryStore {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: WalletState::new(chain),
                next_id: 0,
                subscriptions: BTreeMap::new(),
            })),
        }
    }

    pub fn subscription_count(&self) -> Result<usize, PortError> {
        Ok(self.lock()?.subscriptions.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("store lock poisoned: {e}")))
    }
}

impl StateStore for InMemoryStore {
    fn read(&self) -> Result<WalletState, PortError> {
        Ok(self.lock()?.state.clone())
    }

    fn write(&self, updater: &mut dyn FnMut(&mut WalletState)) -> Result<(), PortError> {
        let (after, notify) = {
            let mut g = self.lock()?;
            let before = g.state.clone();
            let mut after = before.clone();
            updater(&mut after);
            after.accounts = dedup_accounts(after.accounts);
            g.state = after.clone();

            let notify: Vec<(StateSlice, Arc<StateListener>)> = g
                .subscriptions
                .values()
                .filter(|s| s.slice.changed(&before, &after))
                .map(|s| (s.slice, Arc::clone(&s.listener)))
                .collect();
            (after, notify)
        };

        for (slice, listener) in notify {
            trace!(?slice, "notifying store subscriber");
            listener(&after);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        slice: StateSlice,
        on_change: StateListener,
    ) -> Result<SubscriptionId, PortError> {
        let mut g = self.lock()?;
        g.next_id = g.next_id.saturating_add(1);
        let id = g.next_id;
        g.subscriptions.insert(
            id,
            Subscription {
                slice,
                listener: Arc::new(on_change),
            },
        );
        Ok(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError> {
        self.lock()?
            .subscriptions
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("store subscription {}", id.0)))
    }
}
