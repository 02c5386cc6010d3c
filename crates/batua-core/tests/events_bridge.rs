mod common;

use std::sync::{Arc, Mutex};

use batua_core::{
    Account, AnnouncementId, Chain, Provider, ProviderEvent, StateStore, WalletState,
};

use common::{
    account_a, account_b, new_provider, record_events, test_config, FakeClock, TestAnnouncer,
    TestBackend, TestStore, MAINNET, SEPOLIA,
};

fn set_accounts(store: &TestStore, accounts: &[alloy::primitives::Address]) {
    let accounts: Vec<Account> = accounts.iter().copied().map(Account::new).collect();
    store
        .write(&mut |state: &mut WalletState| state.accounts = accounts.clone())
        .expect("write");
}

#[test]
fn account_changes_emit_exactly_one_event_each() {
    let store = TestStore::new(SEPOLIA);
    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA]));
    let events = record_events(&provider);

    set_accounts(&store, &[account_a()]);
    // identical write: no change, no event
    set_accounts(&store, &[account_a()]);
    set_accounts(&store, &[account_a(), account_b()]);

    assert_eq!(
        *events.lock().expect("events"),
        vec![
            ProviderEvent::AccountsChanged(vec![account_a()]),
            ProviderEvent::AccountsChanged(vec![account_a(), account_b()]),
        ]
    );
}

#[test]
fn chain_switch_emits_hex_chain_id_only() {
    let store = TestStore::connected(SEPOLIA, &[account_a()]);
    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA, MAINNET]));
    let events = record_events(&provider);

    store
        .write(&mut |state: &mut WalletState| state.chain = Chain::new(MAINNET, "Ethereum"))
        .expect("write");

    assert_eq!(
        *events.lock().expect("events"),
        vec![ProviderEvent::ChainChanged("0x1".to_owned())]
    );
}

#[test]
fn listeners_may_reenter_the_provider() {
    let store = TestStore::new(SEPOLIA);
    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA]));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let reader = store.clone();
    provider.on(move |event| {
        let accounts = reader.read().expect("read").addresses();
        sink.lock()
            .expect("seen")
            .push((event.name().to_owned(), accounts));
    });
    set_accounts(&store, &[account_b()]);

    assert_eq!(
        *seen.lock().expect("seen"),
        vec![("accountsChanged".to_owned(), vec![account_b()])]
    );
}

#[test]
fn destroy_is_idempotent_and_stops_events() {
    let store = TestStore::new(SEPOLIA);
    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA]));
    let events = record_events(&provider);
    assert_eq!(store.subscriber_count(), 2);

    provider.destroy();
    provider.destroy();
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(store.unsubscribe_calls(), 2);

    set_accounts(&store, &[account_a()]);
    assert!(events.lock().expect("events").is_empty());
}

#[test]
fn dropping_the_provider_detaches_it() {
    let store = TestStore::new(SEPOLIA);
    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA]));
    provider.destroy();
    drop(provider);
    // drop after an explicit destroy must not unsubscribe again
    assert_eq!(store.unsubscribe_calls(), 2);

    let provider = new_provider(store.clone(), TestBackend::serving(&[SEPOLIA]));
    assert_eq!(store.subscriber_count(), 2);
    drop(provider);
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn announces_when_configured_and_withdraws_on_destroy() {
    let announcer = TestAnnouncer::default();
    let mut config = test_config();
    config.announce_provider = true;

    let provider = Provider::with_announcer(
        TestStore::new(SEPOLIA),
        TestBackend::serving(&[SEPOLIA]),
        FakeClock::default(),
        config,
        Box::new(announcer.clone()),
    )
    .expect("provider");

    {
        let announced = announcer.announced.lock().expect("announced");
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].name, "Batua");
        assert_eq!(announced[0].rdns, "pimlico.io");
        assert_eq!(announced[0].uuid, "00000000-0000-4000-8000-000000000001");
    }

    provider.destroy();
    provider.destroy();
    assert_eq!(
        *announcer.withdrawn.lock().expect("withdrawn"),
        vec![AnnouncementId(1)]
    );
}

#[test]
fn no_announcement_unless_configured() {
    let announcer = TestAnnouncer::default();
    let provider = Provider::with_announcer(
        TestStore::new(SEPOLIA),
        TestBackend::serving(&[SEPOLIA]),
        FakeClock::default(),
        test_config(),
        Box::new(announcer.clone()),
    )
    .expect("provider");
    provider.destroy();

    assert!(announcer.announced.lock().expect("announced").is_empty());
    assert!(announcer.withdrawn.lock().expect("withdrawn").is_empty());
}

#[test]
fn teardown_failures_are_swallowed() {
    let announcer = TestAnnouncer {
        fail_withdraw: true,
        ..TestAnnouncer::default()
    };
    let mut config = test_config();
    config.announce_provider = true;
    let store = TestStore::new(SEPOLIA);

    let provider = Provider::with_announcer(
        store.clone(),
        TestBackend::serving(&[SEPOLIA]),
        FakeClock::default(),
        config,
        Box::new(announcer.clone()),
    )
    .expect("provider");
    provider.destroy();
    provider.destroy();

    assert_eq!(announcer.withdrawn.lock().expect("withdrawn").len(), 1);
    assert_eq!(store.subscriber_count(), 0);
}
