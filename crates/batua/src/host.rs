//! Newline-delimited JSON-RPC host around a native provider.
//!
//! Each input line is `{"id", "method", "params"}`; each answer is a
//! JSON-RPC 2.0 response on its own line. Requests run concurrently and are
//! answered in completion order. Provider and discovery events are written as
//! `batua_event` notifications ahead of the response that caused them.

use std::borrow::Cow;
use std::rc::Rc;

use eyre::WrapErr;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinSet, LocalSet};
use tracing::{debug, info, warn};

use batua_adapters::{
    AdapterConfig, DeterministicBackend, DiscoveryEvent, DiscoveryRegistry, InMemoryStore,
    SystemClock,
};
use batua_core::{ErrorCode, Provider, ProviderEvent, RpcError, RpcRequest};

pub const EVENT_METHOD: &str = "batua_event";
const ANNOUNCE_PROVIDER: &str = "announceProvider";
const WITHDRAW_PROVIDER: &str = "withdrawProvider";

pub type NativeProvider = Provider<InMemoryStore, DeterministicBackend, SystemClock>;

#[derive(Debug, Deserialize)]
struct HostRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Events and responses share one queue, so a request's notifications are
/// always written before its response.
pub struct Host {
    provider: Rc<NativeProvider>,
    outbound_tx: UnboundedSender<Value>,
    outbound: UnboundedReceiver<Value>,
}

impl Host {
    pub fn from_config(config: &AdapterConfig, uuid: String) -> eyre::Result<Self> {
        let (tx, outbound) = unbounded_channel();

        let discovery_tx = tx.clone();
        let registry = DiscoveryRegistry::with_sink(move |event| {
            let (name, info) = match event {
                DiscoveryEvent::Announced(info) => (ANNOUNCE_PROVIDER, info),
                DiscoveryEvent::Withdrawn(info) => (WITHDRAW_PROVIDER, info),
            };
            notify(&discovery_tx, name, json!({ "info": info }));
        });

        let default_chain = config
            .chains
            .first()
            .map(|c| c.chain.clone())
            .ok_or_else(|| eyre::eyre!("no chains configured"))?;
        let store = InMemoryStore::new(default_chain);
        let backend =
            DeterministicBackend::from_config(config).wrap_err("failed to build backend")?;

        let provider = Provider::with_announcer(
            store,
            backend,
            SystemClock,
            config.provider_config(uuid),
            Box::new(registry),
        )
        .wrap_err("failed to attach provider")?;

        let events_tx = tx.clone();
        provider.on(move |event: &ProviderEvent| notify(&events_tx, event.name(), event.data()));

        Ok(Self {
            provider: Rc::new(provider),
            outbound_tx: tx,
            outbound,
        })
    }

    /// Serves requests until `reader` is exhausted. Requests still in flight
    /// are then finished before the provider is detached.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> eyre::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let provider = &self.provider;
        let outbound_tx = &self.outbound_tx;
        let outbound = &mut self.outbound;
        let local = LocalSet::new();
        local
            .run_until(async {
                let mut in_flight = JoinSet::new();
                let mut lines = reader.lines();
                loop {
                    tokio::select! {
                        line = lines.next_line() => {
                            let Some(line) = line.wrap_err("failed to read request")? else {
                                break;
                            };
                            let provider = Rc::clone(provider);
                            let tx = outbound_tx.clone();
                            in_flight.spawn_local(async move {
                                if let Some(response) = respond(&provider, &line).await {
                                    let _ = tx.send(response);
                                }
                            });
                        }
                        Some(message) = outbound.recv() => {
                            write_line(&mut writer, &message).await?;
                        }
                        Some(joined) = in_flight.join_next() => {
                            if let Err(e) = joined {
                                warn!(error = %e, "request task failed");
                            }
                        }
                    }
                }

                debug!(pending = in_flight.len(), "input closed, finishing requests");
                while let Some(joined) = in_flight.join_next().await {
                    if let Err(e) = joined {
                        warn!(error = %e, "request task failed");
                    }
                }
                Ok::<_, eyre::Report>(())
            })
            .await?;

        info!("input closed, detaching provider");
        self.provider.destroy();
        self.flush(&mut writer).await
    }

    /// Response for one input line; `None` for blank lines.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        respond(&self.provider, line).await
    }

    async fn flush<W>(&mut self, writer: &mut W) -> eyre::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while let Ok(message) = self.outbound.try_recv() {
            write_line(writer, &message).await?;
        }
        Ok(())
    }
}

async fn respond(provider: &NativeProvider, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let request: HostRequest = match serde_json::from_str::<Value>(line) {
        Err(e) => {
            warn!(error = %e, "unparseable request line");
            return Some(error_response(
                Value::Null,
                protocol_error(ErrorCode::ParseError, e.to_string()),
            ));
        }
        Ok(raw) => {
            let id = raw.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(raw) {
                Ok(request) => request,
                Err(e) => {
                    return Some(error_response(
                        id,
                        protocol_error(ErrorCode::InvalidRequest, e.to_string()),
                    ))
                }
            }
        }
    };

    debug!(id = %request.id, method = %request.method, "host request");
    let rpc = RpcRequest {
        method: request.method,
        params: request.params,
    };
    Some(match provider.request(rpc).await {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": request.id, "result": result }),
        Err(e) => {
            debug!(error = %e, "request failed");
            error_response(request.id, e.to_rpc_error())
        }
    })
}

fn notify(tx: &UnboundedSender<Value>, event: &str, data: Value) {
    let notification = json!({
        "jsonrpc": "2.0",
        "method": EVENT_METHOD,
        "params": { "event": event, "data": data },
    });
    if tx.send(notification).is_err() {
        debug!(event, "host gone, dropping notification");
    }
}

fn protocol_error(code: ErrorCode, detail: String) -> RpcError {
    RpcError {
        code,
        message: Cow::Borrowed(code.message()),
        data: Some(Value::String(detail)),
    }
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

async fn write_line<W>(writer: &mut W, value: &Value) -> eyre::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await.wrap_err("failed to write output")?;
    writer.flush().await.wrap_err("failed to flush output")?;
    Ok(())
}
