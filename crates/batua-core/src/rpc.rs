//! Decoding of raw provider requests into typed wallet requests.

use alloy::primitives::{Address, Bytes, ChainId, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{parse_hex_chain_id, BatchHandle, Call};
use crate::error::ProviderError;

pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const WALLET_GET_CAPABILITIES: &str = "wallet_getCapabilities";
pub const WALLET_SEND_CALLS: &str = "wallet_sendCalls";
pub const WALLET_GET_CALLS_STATUS: &str = "wallet_getCallsStatus";
pub const WALLET_REVOKE_PERMISSIONS: &str = "wallet_revokePermissions";

const WALLET_NAMESPACE: &str = "wallet_";

/// A request as it arrives from the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn without_params(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletRequest {
    Accounts,
    ChainId,
    /// Account and chain filters are validated but do not narrow the result.
    GetCapabilities,
    RequestAccounts,
    SendTransaction(TransactionRequest),
    SendCalls(SendCallsRequest),
    GetCallsStatus(BatchHandle),
    RevokePermissions,
}

impl WalletRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Accounts => ETH_ACCOUNTS,
            Self::ChainId => ETH_CHAIN_ID,
            Self::GetCapabilities => WALLET_GET_CAPABILITIES,
            Self::RequestAccounts => ETH_REQUEST_ACCOUNTS,
            Self::SendTransaction(_) => ETH_SEND_TRANSACTION,
            Self::SendCalls(_) => WALLET_SEND_CALLS,
            Self::GetCallsStatus(_) => WALLET_GET_CALLS_STATUS,
            Self::RevokePermissions => WALLET_REVOKE_PERMISSIONS,
        }
    }
}

/// Legacy single-call `eth_sendTransaction` parameters.
///
/// Gas and nonce fields are accepted and ignored; the backend prices and
/// sequences the user operation itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default, deserialize_with = "deserialize_hex_chain_id")]
    pub chain_id: Option<ChainId>,
}

impl TransactionRequest {
    pub fn to_call(&self) -> Call {
        Call {
            to: self.to,
            data: Some(self.data.clone().unwrap_or_default()),
            value: self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCallsRequest {
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default, deserialize_with = "deserialize_hex_chain_id")]
    pub chain_id: Option<ChainId>,
    pub calls: Vec<Call>,
    #[serde(default)]
    pub capabilities: Option<Map<String, Value>>,
    #[serde(default)]
    pub version: Option<String>,
}

pub fn is_wallet_namespace(method: &str) -> bool {
    method.starts_with(WALLET_NAMESPACE)
}

/// Decodes `request` for one of the recognised wallet methods.
///
/// Unknown methods fail with [`ProviderError::MethodNotSupported`]; whether
/// that is fatal is decided by the caller via [`is_wallet_namespace`].
pub fn parse_request(request: &RpcRequest) -> Result<WalletRequest, ProviderError> {
    let method = request.method.as_str();
    let params = || positional(method, request.params.as_ref());

    match method {
        ETH_ACCOUNTS => no_params(method, params()?).map(|()| WalletRequest::Accounts),
        ETH_CHAIN_ID => no_params(method, params()?).map(|()| WalletRequest::ChainId),
        ETH_REQUEST_ACCOUNTS => {
            no_params(method, params()?).map(|()| WalletRequest::RequestAccounts)
        }
        WALLET_GET_CAPABILITIES => parse_get_capabilities(params()?),
        ETH_SEND_TRANSACTION => {
            single::<TransactionRequest>(method, params()?).map(WalletRequest::SendTransaction)
        }
        WALLET_SEND_CALLS => {
            let req = single::<SendCallsRequest>(method, params()?)?;
            if req.calls.is_empty() {
                return Err(ProviderError::InvalidParams(format!(
                    "{method}: calls must not be empty"
                )));
            }
            Ok(WalletRequest::SendCalls(req))
        }
        WALLET_GET_CALLS_STATUS => {
            single::<BatchHandle>(method, params()?).map(WalletRequest::GetCallsStatus)
        }
        WALLET_REVOKE_PERMISSIONS => params().map(|_| WalletRequest::RevokePermissions),
        // params of unknown methods are left alone so they can be forwarded verbatim
        other => Err(ProviderError::MethodNotSupported(other.to_owned())),
    }
}

fn positional<'a>(method: &str, params: Option<&'a Value>) -> Result<&'a [Value], ProviderError> {
    match params {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(ProviderError::InvalidParams(format!(
            "{method}: params must be an array, got {other}"
        ))),
    }
}

fn no_params(method: &str, params: &[Value]) -> Result<(), ProviderError> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::InvalidParams(format!(
            "{method}: expected no params, got {}",
            params.len()
        )))
    }
}

fn single<T: DeserializeOwned>(method: &str, params: &[Value]) -> Result<T, ProviderError> {
    match params {
        [value] => serde_json::from_value(value.clone())
            .map_err(|e| ProviderError::InvalidParams(format!("{method}: {e}"))),
        _ => Err(ProviderError::InvalidParams(format!(
            "{method}: expected exactly one param, got {}",
            params.len()
        ))),
    }
}

fn parse_get_capabilities(params: &[Value]) -> Result<WalletRequest, ProviderError> {
    let invalid =
        |msg: String| ProviderError::InvalidParams(format!("{WALLET_GET_CAPABILITIES}: {msg}"));
    if params.len() > 2 {
        return Err(invalid(format!(
            "expected at most two params, got {}",
            params.len()
        )));
    }
    if let Some(account) = params.first().filter(|v| !v.is_null()) {
        serde_json::from_value::<Address>(account.clone()).map_err(|e| invalid(e.to_string()))?;
    }
    if let Some(chain_ids) = params.get(1) {
        let chain_ids: Vec<String> =
            serde_json::from_value(chain_ids.clone()).map_err(|e| invalid(e.to_string()))?;
        for raw in &chain_ids {
            parse_hex_chain_id(raw)?;
        }
    }
    Ok(WalletRequest::GetCapabilities)
}

fn deserialize_hex_chain_id<'de, D>(deserializer: D) -> Result<Option<ChainId>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_hex_chain_id(&raw).map_err(serde::de::Error::custom))
        .transpose()
}
