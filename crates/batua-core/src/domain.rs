use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::{Address, Bytes, ChainId, TxHash, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// A smart-account instance owned by the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
}

impl Account {
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    pub name: String,
}

impl Chain {
    pub fn new(id: ChainId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Point-in-time view of the store: connected accounts plus the single active chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub accounts: Vec<Account>,
    pub chain: Chain,
}

impl WalletState {
    pub fn new(chain: Chain) -> Self {
        Self {
            accounts: Vec::new(),
            chain,
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.accounts.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }

    /// Addresses are fixed 20-byte values, so equality here is already
    /// independent of the hex casing the caller used.
    pub fn find_account(&self, address: Address) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address == address)
    }
}

/// Drops repeated addresses while keeping first-seen order.
pub fn dedup_accounts(accounts: Vec<Account>) -> Vec<Account> {
    let mut out: Vec<Account> = Vec::with_capacity(accounts.len());
    for account in accounts {
        if !out.iter().any(|a| a.address == account.address) {
            out.push(account);
        }
    }
    out
}

/// Part of [`WalletState`] a store subscriber is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSlice {
    Accounts,
    Chain,
}

impl StateSlice {
    pub fn changed(self, before: &WalletState, after: &WalletState) -> bool {
        match self {
            Self::Accounts => before.accounts != after.accounts,
            Self::Chain => before.chain.id != after.chain.id,
        }
    }
}

/// One unit of a batch. Order inside a batch is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

/// Correlation token returned by `send_calls`.
///
/// Callers must treat this as opaque; it is only ever compared and echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchHandle(pub Bytes);

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend view of a batch. Unknown fields are preserved so the status can be
/// returned to callers exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsStatus {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Vec<CallReceipt>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallsStatus {
    pub const PENDING: u16 = 100;
    pub const CONFIRMED: u16 = 200;

    pub fn pending() -> Self {
        Self {
            status: Self::PENDING,
            receipts: None,
            extra: Map::new(),
        }
    }

    pub fn confirmed(receipts: Vec<CallReceipt>) -> Self {
        Self {
            status: Self::CONFIRMED,
            receipts: Some(receipts),
            extra: Map::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status >= 200
    }

    pub fn first_transaction_hash(&self) -> Option<TxHash> {
        self.receipts
            .as_ref()
            .and_then(|r| r.first())
            .map(|r| r.transaction_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReceipt {
    pub transaction_hash: TxHash,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallReceipt {
    pub fn new(transaction_hash: TxHash) -> Self {
        Self {
            transaction_hash,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCapabilities {
    pub atomic_batch: Capability,
    pub paymaster_service: Capability,
}

impl Default for ChainCapabilities {
    fn default() -> Self {
        Self {
            atomic_batch: Capability { supported: true },
            paymaster_service: Capability { supported: true },
        }
    }
}

/// Keyed by hex chain id.
pub type Capabilities = BTreeMap<String, ChainCapabilities>;

pub fn capabilities_for(chains: &[Chain]) -> Capabilities {
    chains
        .iter()
        .map(|c| (hex_chain_id(c.id), ChainCapabilities::default()))
        .collect()
}

/// Descriptor advertised to the host environment (EIP-6963 style).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub uuid: String,
    pub name: String,
    pub icon: String,
    pub rdns: String,
}

pub fn hex_chain_id(id: ChainId) -> String {
    format!("{id:#x}")
}

/// Strict boundary decoding: only `0x`-prefixed hex quantities are chain ids.
pub fn parse_hex_chain_id(raw: &str) -> Result<ChainId, ProviderError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ProviderError::InvalidParams(format!("chain id must be hex: {raw}")))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProviderError::InvalidParams(format!(
            "invalid hex chain id: {raw}"
        )));
    }
    ChainId::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidParams(format!("invalid hex chain id {raw}: {e}")))
}
