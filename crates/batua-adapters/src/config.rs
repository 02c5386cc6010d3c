use alloy::primitives::ChainId;
use thiserror::Error;
use uuid::Uuid;

use batua_core::{parse_hex_chain_id, Chain, PollConfig, ProviderConfig};

pub const ENV_CHAINS: &str = "BATUA_CHAINS";
pub const ENV_ANNOUNCE: &str = "BATUA_ANNOUNCE";
pub const ENV_POLL_BUDGET_MS: &str = "BATUA_POLL_BUDGET_MS";
pub const ENV_POLL_ATTEMPT_TIMEOUT_MS: &str = "BATUA_POLL_ATTEMPT_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "BATUA_POLL_INTERVAL_MS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "BATUA_HTTP_TIMEOUT_MS";
pub const ENV_DETERMINISTIC_PENDING_POLLS: &str = "BATUA_DETERMINISTIC_PENDING_POLLS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// A served chain and, optionally, the JSON-RPC endpoint non-wallet
/// requests are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub chain: Chain,
    pub rpc_url: Option<String>,
}

impl ChainEndpoint {
    pub fn offline(id: ChainId) -> Self {
        Self {
            chain: Chain::new(id, chain_name(id)),
            rpc_url: None,
        }
    }

    pub fn http(id: ChainId, rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: Some(rpc_url.into()),
            ..Self::offline(id)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// First entry is the chain the wallet starts on.
    pub chains: Vec<ChainEndpoint>,
    pub announce_provider: bool,
    pub poll: PollConfig,
    pub http_timeout_ms: u64,
    /// Status queries answered with "pending" before a batch confirms.
    pub deterministic_pending_polls: u32,
    pub deterministic_account_count: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            chains: vec![ChainEndpoint::offline(11_155_111)],
            announce_provider: true,
            poll: PollConfig::default(),
            http_timeout_ms: 15_000,
            deterministic_pending_polls: 2,
            deterministic_account_count: 1,
        }
    }
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CHAINS) {
            config.chains = parse_chains(&raw)?;
        }
        if let Some(raw) = lookup(ENV_ANNOUNCE) {
            config.announce_provider = parse_bool(ENV_ANNOUNCE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_BUDGET_MS) {
            config.poll.budget_ms = parse_number(ENV_POLL_BUDGET_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_ATTEMPT_TIMEOUT_MS) {
            config.poll.attempt_timeout_ms = parse_number(ENV_POLL_ATTEMPT_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll.interval_ms = parse_number(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_MS) {
            config.http_timeout_ms = parse_number(ENV_HTTP_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DETERMINISTIC_PENDING_POLLS) {
            config.deterministic_pending_polls =
                parse_number(ENV_DETERMINISTIC_PENDING_POLLS, &raw)?;
        }
        Ok(config)
    }

    pub fn default_chain(&self) -> ChainId {
        self.chains
            .first()
            .map(|c| c.chain.id)
            .unwrap_or(11_155_111)
    }

    pub fn provider_config(&self, uuid: impl Into<String>) -> ProviderConfig {
        let mut config = ProviderConfig::with_uuid(uuid);
        config.chains = self.chains.iter().map(|c| c.chain.clone()).collect();
        config.announce_provider = self.announce_provider;
        config.poll = self.poll;
        config
    }
}

/// Random version 4 uuid for the discovery descriptor.
pub fn random_uuid_v4() -> String {
    Uuid::new_v4().to_string()
}

fn chain_name(id: ChainId) -> String {
    match id {
        1 => "Ethereum".to_owned(),
        10 => "OP Mainnet".to_owned(),
        137 => "Polygon".to_owned(),
        8453 => "Base".to_owned(),
        42161 => "Arbitrum One".to_owned(),
        84532 => "Base Sepolia".to_owned(),
        11_155_111 => "Sepolia".to_owned(),
        other => format!("Chain {other}"),
    }
}

/// `id[=url]` entries separated by commas; ids are decimal or `0x` hex.
fn parse_chains(raw: &str) -> Result<Vec<ChainEndpoint>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: ENV_CHAINS,
        reason,
    };

    let mut chains: Vec<ChainEndpoint> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, url) = match entry.split_once('=') {
            Some((id, url)) => (id.trim(), Some(url.trim())),
            None => (entry, None),
        };
        let id = if id.starts_with("0x") || id.starts_with("0X") {
            parse_hex_chain_id(id).map_err(|e| invalid(e.to_string()))?
        } else {
            id.parse::<ChainId>()
                .map_err(|e| invalid(format!("chain id {id}: {e}")))?
        };
        if chains.iter().any(|c| c.chain.id == id) {
            return Err(invalid(format!("chain {id} listed twice")));
        }
        chains.push(match url {
            Some(url) if !url.is_empty() => ChainEndpoint::http(id, url),
            _ => ChainEndpoint::offline(id),
        });
    }
    if chains.is_empty() {
        return Err(invalid("no chains configured".to_owned()));
    }
    Ok(chains)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("{raw:?}: {e}"),
    })
}
