use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::ChainId;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, trace};

use batua_core::{ErrorCode, NetworkClient, PortError};

use crate::config::AdapterConfig;

/// JSON-RPC client for one chain. Chains configured without an endpoint
/// still resolve, but every forwarded request fails.
#[derive(Debug, Clone)]
pub struct HttpNetworkClient {
    chain_id: ChainId,
    transport: Transport,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
enum Transport {
    Offline,
    Http { url: String, client: reqwest::Client },
}

impl HttpNetworkClient {
    pub fn offline(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            transport: Transport::Offline,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn http(chain_id: ChainId, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            chain_id,
            transport: Transport::Http {
                url: url.into(),
                client,
            },
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait(?Send)]
impl NetworkClient for HttpNetworkClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let (url, client) = match &self.transport {
            Transport::Http { url, client } => (url, client),
            Transport::Offline => {
                return Err(PortError::NotImplemented(
                    "no rpc endpoint configured for this chain",
                ))
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(chain_id = self.chain_id, method, id, "json-rpc request");

        let response = client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("rpc request to {url} failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("rpc response decode failed: {e}")))?;

        // node errors are reported as-is, whatever the HTTP status
        if let Some(err) = body.get("error") {
            return Err(rpc_error(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!("rpc status {status}: {body}")));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("rpc response missing result".to_owned()))
    }
}

fn rpc_error(err: &Value) -> PortError {
    PortError::Rpc {
        code: err
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| ErrorCode::InternalError.code()),
        message: err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("rpc error")
            .to_owned(),
        data: err.get("data").cloned(),
    }
}

/// Per-chain clients sharing one connection pool.
#[derive(Debug, Clone)]
pub struct NetworkClients {
    clients: BTreeMap<ChainId, HttpNetworkClient>,
    default_chain: ChainId,
}

impl NetworkClients {
    pub fn from_config(config: &AdapterConfig) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build http client: {e}")))?;

        let clients = config
            .chains
            .iter()
            .map(|endpoint| {
                let id = endpoint.chain.id;
                let client = match &endpoint.rpc_url {
                    Some(url) => HttpNetworkClient::http(id, url.clone(), http.clone()),
                    None => HttpNetworkClient::offline(id),
                };
                (id, client)
            })
            .collect();

        Ok(Self {
            clients,
            default_chain: config.default_chain(),
        })
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.clients.keys().copied()
    }

    /// Client for `chain_id`, or for the default chain when it is not served.
    pub fn resolve(&self, chain_id: ChainId) -> Result<HttpNetworkClient, PortError> {
        if let Some(client) = self.clients.get(&chain_id) {
            return Ok(client.clone());
        }
        debug!(
            requested = chain_id,
            fallback = self.default_chain,
            "chain not served, using default client"
        );
        self.clients
            .get(&self.default_chain)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("client for chain {}", self.default_chain)))
    }
}
