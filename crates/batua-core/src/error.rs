//! Provider error taxonomy and its JSON-RPC representation.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, ChainId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::BatchHandle;
use crate::ports::PortError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("method not supported: {0}")]
    MethodNotSupported(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("provider is disconnected from all chains")]
    Disconnected,
    #[error("provider is not connected to chain {requested:#x} (client chain {resolved:#x})")]
    ChainDisconnected {
        requested: ChainId,
        resolved: ChainId,
    },
    #[error("account {0} is not authorized")]
    Unauthorized(Address),
    #[error("timed out after {elapsed:?} waiting for batch {handle} ({polls} polls)")]
    OperationTimedOut {
        handle: BatchHandle,
        elapsed: Duration,
        polls: u32,
    },
    #[error("malformed backend response: {0}")]
    MalformedBackendResponse(String),
    #[error(transparent)]
    Backend(#[from] PortError),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotSupported(_) => ErrorCode::UnsupportedMethod,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Disconnected => ErrorCode::Disconnected,
            Self::ChainDisconnected { .. } => ErrorCode::ChainDisconnected,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::OperationTimedOut { .. } | Self::MalformedBackendResponse(_) => {
                ErrorCode::InternalError
            }
            Self::Backend(PortError::Rpc { code, .. }) => ErrorCode::from(*code),
            Self::Backend(_) => ErrorCode::InternalError,
        }
    }

    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            // upstream errors pass through with their own message and data
            Self::Backend(PortError::Rpc {
                code,
                message,
                data,
            }) => RpcError {
                code: ErrorCode::from(*code),
                message: Cow::Owned(message.clone()),
                data: data.clone(),
            },
            Self::MethodNotSupported(_)
            | Self::Disconnected
            | Self::ChainDisconnected { .. }
            | Self::Unauthorized(_) => RpcError {
                code: self.code(),
                message: Cow::Borrowed(self.code().message()),
                data: Some(Value::String(self.to_string())),
            },
            _ => RpcError {
                code: self.code(),
                message: Cow::Owned(self.to_string()),
                data: None,
            },
        }
    }
}

/// JSON-RPC error object returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

/// EIP-1193 provider codes plus the JSON-RPC ones this provider emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    UnsupportedMethod,
    Disconnected,
    ChainDisconnected,
    ParseError,
    InvalidRequest,
    InvalidParams,
    InternalError,
    Other(i64),
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match *self {
            Self::Unauthorized => 4100,
            Self::UnsupportedMethod => 4200,
            Self::Disconnected => 4900,
            Self::ChainDisconnected => 4901,
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Other(c) => c,
        }
    }

    pub const fn message(&self) -> &'static str {
        match *self {
            Self::Unauthorized => {
                "The requested method and/or account has not been authorized by the user."
            }
            Self::UnsupportedMethod => "The Provider does not support the requested method.",
            Self::Disconnected => "The Provider is disconnected from all chains.",
            Self::ChainDisconnected => "The Provider is not connected to the requested chain.",
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::Other(_) => "Upstream error",
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            4100 => Self::Unauthorized,
            4200 => Self::UnsupportedMethod,
            4900 => Self::Disconnected,
            4901 => Self::ChainDisconnected,
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            _ => Self::Other(code),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Into::into)
    }
}
