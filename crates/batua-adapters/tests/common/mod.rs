#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use batua_adapters::{
    AdapterConfig, ChainEndpoint, DeterministicBackend, InMemoryStore, SystemClock,
};
use batua_core::{Chain, PollConfig, Provider};

pub const SEPOLIA: u64 = 11_155_111;
pub const BASE: u64 = 8453;

pub type NativeProvider = Provider<InMemoryStore, DeterministicBackend, SystemClock>;

pub fn fast_poll() -> PollConfig {
    PollConfig {
        budget_ms: 2_000,
        attempt_timeout_ms: 500,
        interval_ms: 1,
    }
}

pub fn adapter_config(chains: Vec<ChainEndpoint>, pending_polls: u32) -> AdapterConfig {
    AdapterConfig {
        chains,
        announce_provider: false,
        poll: fast_poll(),
        http_timeout_ms: 5_000,
        deterministic_pending_polls: pending_polls,
        deterministic_account_count: 2,
    }
}

pub fn native_provider(config: &AdapterConfig) -> NativeProvider {
    let store = InMemoryStore::new(Chain::new(config.default_chain(), "default"));
    let backend = DeterministicBackend::from_config(config).expect("backend");
    Provider::new(
        store,
        backend,
        SystemClock,
        config.provider_config("00000000-0000-4000-8000-00000000000a"),
    )
    .expect("provider")
}

/// JSON-RPC upstream answering from `reply`; every request body is recorded.
pub fn spawn_rpc_server(
    requests: Arc<Mutex<Vec<Value>>>,
    reply: fn(&Value) -> (u16, Value),
) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        for _ in 0..16 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            if req.as_reader().read_to_string(&mut body).is_err() {
                break;
            }
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            if let Ok(mut g) = requests.lock() {
                g.push(payload.clone());
            }
            let (code, reply) = reply(&payload);
            let response =
                Response::from_string(reply.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, join)
}

pub fn echo_block_number(payload: &Value) -> (u16, Value) {
    match payload["method"].as_str() {
        Some("eth_blockNumber") => (
            200,
            json!({ "jsonrpc": "2.0", "id": payload["id"], "result": "0x10" }),
        ),
        Some("eth_getBalance") => (
            200,
            json!({
                "jsonrpc": "2.0",
                "id": payload["id"],
                "error": { "code": -32000, "message": "header not found", "data": "0xdead" }
            }),
        ),
        _ => (500, json!({ "error": "unexpected" })),
    }
}
