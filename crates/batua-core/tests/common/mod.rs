#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, ChainId};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use batua_core::{
    Account, ActionContext, AnnouncementId, AnnouncerPort, BackendActions, BatchHandle, Call,
    CallsStatus, Chain, ClockPort, NetworkClient, PortError, Provider, ProviderConfig,
    ProviderEvent, ProviderInfo, StateListener, StateSlice, StateStore, SubscriptionId,
    WalletState,
};

pub const SEPOLIA: ChainId = 11_155_111;
pub const MAINNET: ChainId = 1;

pub fn account_a() -> Address {
    "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
        .parse()
        .expect("account a")
}

pub fn account_b() -> Address {
    "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
        .parse()
        .expect("account b")
}

pub fn target() -> Address {
    "0x000000000000000000000000000000000000CAFE"
        .parse()
        .expect("target")
}

pub fn handle(byte: u8) -> BatchHandle {
    BatchHandle(vec![byte; 32].into())
}

#[derive(Default)]
struct StoreInner {
    state: Option<WalletState>,
    next_id: u64,
    listeners: HashMap<u64, (StateSlice, Arc<StateListener>)>,
    unsubscribed: Vec<u64>,
}

#[derive(Clone)]
pub struct TestStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl TestStore {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: Some(WalletState::new(Chain::new(chain_id, "test"))),
                ..StoreInner::default()
            })),
        }
    }

    pub fn connected(chain_id: ChainId, accounts: &[Address]) -> Self {
        let store = Self::new(chain_id);
        store
            .inner
            .lock()
            .expect("store lock")
            .state
            .as_mut()
            .expect("state")
            .accounts = accounts.iter().copied().map(Account::new).collect();
        store
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("store lock").listeners.len()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.inner.lock().expect("store lock").unsubscribed.len()
    }
}

impl StateStore for TestStore {
    fn read(&self) -> Result<WalletState, PortError> {
        self.inner
            .lock()
            .expect("store lock")
            .state
            .clone()
            .ok_or(PortError::NotFound("state".to_owned()))
    }

    fn write(&self, updater: &mut dyn FnMut(&mut WalletState)) -> Result<(), PortError> {
        let (after, notify) = {
            let mut g = self.inner.lock().expect("store lock");
            let before = g.state.clone().expect("state");
            let mut after = before.clone();
            updater(&mut after);
            g.state = Some(after.clone());
            let notify: Vec<Arc<StateListener>> = g
                .listeners
                .values()
                .filter(|(slice, _)| slice.changed(&before, &after))
                .map(|(_, l)| Arc::clone(l))
                .collect();
            (after, notify)
        };
        for listener in notify {
            listener(&after);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        slice: StateSlice,
        on_change: StateListener,
    ) -> Result<SubscriptionId, PortError> {
        let mut g = self.inner.lock().expect("store lock");
        g.next_id += 1;
        let id = g.next_id;
        g.listeners.insert(id, (slice, Arc::new(on_change)));
        Ok(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), PortError> {
        let mut g = self.inner.lock().expect("store lock");
        g.unsubscribed.push(id.0);
        g.listeners
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("subscription {}", id.0)))
    }
}

#[derive(Debug, Clone)]
pub struct TestClient {
    pub chain_id: ChainId,
    forwarded: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait(?Send)]
impl NetworkClient for TestClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        self.forwarded
            .lock()
            .expect("forward lock")
            .push((method.to_owned(), params.clone()));
        Ok(json!({ "forwarded": method, "params": params }))
    }
}

#[derive(Debug, Clone)]
pub struct SentBatch {
    pub from: Address,
    pub calls: Vec<Call>,
    pub capabilities: Option<Map<String, Value>>,
    pub client_chain: ChainId,
}

#[derive(Debug, Default)]
struct BackendInner {
    invocations: Vec<&'static str>,
    accounts: Vec<Address>,
    statuses: VecDeque<CallsStatus>,
    sent: Vec<SentBatch>,
    status_timeouts: Vec<Option<Duration>>,
    served_chains: Vec<ChainId>,
}

/// Backend stub: records every invocation and replays scripted statuses.
/// Once the script runs out every status query reports pending.
#[derive(Debug, Clone, Default)]
pub struct TestBackend {
    inner: Arc<Mutex<BackendInner>>,
    forwarded: Arc<Mutex<Vec<(String, Value)>>>,
}

impl TestBackend {
    pub fn serving(chains: &[ChainId]) -> Self {
        let backend = Self::default();
        backend.inner.lock().expect("backend lock").served_chains = chains.to_vec();
        backend
    }

    pub fn with_accounts(self, accounts: &[Address]) -> Self {
        self.inner.lock().expect("backend lock").accounts = accounts.to_vec();
        self
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = CallsStatus>) {
        self.inner
            .lock()
            .expect("backend lock")
            .statuses
            .extend(statuses);
    }

    pub fn invocations(&self) -> Vec<&'static str> {
        self.inner.lock().expect("backend lock").invocations.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.invocations().iter().filter(|x| **x == name).count()
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.inner.lock().expect("backend lock").sent.clone()
    }

    pub fn status_timeouts(&self) -> Vec<Option<Duration>> {
        self.inner.lock().expect("backend lock").status_timeouts.clone()
    }

    pub fn forwarded(&self) -> Vec<(String, Value)> {
        self.forwarded.lock().expect("forward lock").clone()
    }

    fn record(&self, name: &'static str) {
        self.inner.lock().expect("backend lock").invocations.push(name);
    }
}

#[async_trait(?Send)]
impl BackendActions for TestBackend {
    type Client = TestClient;

    fn resolve_client(&self, chain_id: ChainId) -> Result<TestClient, PortError> {
        self.record("resolve_client");
        let served = self.inner.lock().expect("backend lock").served_chains.clone();
        // unknown chains fall back to the first served chain
        let chain_id = if served.contains(&chain_id) {
            chain_id
        } else {
            *served
                .first()
                .ok_or_else(|| PortError::NotFound("no chains served".to_owned()))?
        };
        Ok(TestClient {
            chain_id,
            forwarded: Arc::clone(&self.forwarded),
        })
    }

    async fn load_accounts(
        &self,
        _ctx: ActionContext<'_, TestClient>,
    ) -> Result<Vec<Account>, PortError> {
        self.record("load_accounts");
        let accounts = self.inner.lock().expect("backend lock").accounts.clone();
        Ok(accounts.into_iter().map(Account::new).collect())
    }

    async fn send_calls(
        &self,
        ctx: ActionContext<'_, TestClient>,
        account: &Account,
        calls: &[Call],
        capabilities: Option<&Map<String, Value>>,
    ) -> Result<BatchHandle, PortError> {
        self.record("send_calls");
        let mut g = self.inner.lock().expect("backend lock");
        g.sent.push(SentBatch {
            from: account.address,
            calls: calls.to_vec(),
            capabilities: capabilities.cloned(),
            client_chain: ctx.client.chain_id,
        });
        Ok(handle(g.sent.len() as u8))
    }

    async fn get_calls_status(
        &self,
        _ctx: ActionContext<'_, TestClient>,
        _handle: &BatchHandle,
        timeout: Option<Duration>,
    ) -> Result<CallsStatus, PortError> {
        self.record("get_calls_status");
        let mut g = self.inner.lock().expect("backend lock");
        g.status_timeouts.push(timeout);
        Ok(g.statuses.pop_front().unwrap_or_else(CallsStatus::pending))
    }
}

/// Deterministic clock: `sleep` advances time instantly.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: AtomicU64,
    sleeps: AtomicU64,
}

impl FakeClock {
    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl ClockPort for FakeClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.now
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestAnnouncer {
    pub announced: Arc<Mutex<Vec<ProviderInfo>>>,
    pub withdrawn: Arc<Mutex<Vec<AnnouncementId>>>,
    pub fail_withdraw: bool,
}

impl AnnouncerPort for TestAnnouncer {
    fn announce(&self, info: &ProviderInfo) -> Result<AnnouncementId, PortError> {
        let mut g = self.announced.lock().expect("announce lock");
        g.push(info.clone());
        Ok(AnnouncementId(g.len() as u64))
    }

    fn withdraw(&self, id: AnnouncementId) -> Result<(), PortError> {
        self.withdrawn.lock().expect("withdraw lock").push(id);
        if self.fail_withdraw {
            return Err(PortError::Transport("host went away".to_owned()));
        }
        Ok(())
    }
}

pub type TestProvider = Provider<TestStore, TestBackend, FakeClock>;

pub fn test_config() -> ProviderConfig {
    let mut config = ProviderConfig::with_uuid("00000000-0000-4000-8000-000000000001");
    config.chains = vec![Chain::new(SEPOLIA, "Sepolia"), Chain::new(MAINNET, "Ethereum")];
    config
}

pub fn new_provider(store: TestStore, backend: TestBackend) -> TestProvider {
    Provider::new(store, backend, FakeClock::default(), test_config()).expect("provider")
}

pub fn record_events(provider: &TestProvider) -> Arc<Mutex<Vec<ProviderEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    provider.on(move |event| sink.lock().expect("events lock").push(event.clone()));
    events
}
