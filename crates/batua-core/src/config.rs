use crate::domain::{Chain, ProviderInfo};

pub const PROVIDER_NAME: &str = "Batua";
pub const PROVIDER_RDNS: &str = "pimlico.io";
pub const PROVIDER_ICON: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iNDIyIiBoZWlnaHQ9IjQyMiIgdmlld0JveD0iMCAwIDQyMiA0MjIiIGZpbGw9Im5vbmUiIHhtbG5zPSJodHRwOi8vd3d3LnczLm9yZy8yMDAwL3N2ZyI+PHJlY3Qgd2lkdGg9IjQyMiIgaGVpZ2h0PSI0MjIiIGZpbGw9ImJsYWNrIi8+PHJlY3QgeD0iODEiIHk9IjEwNCIgd2lkdGg9IjI1OSIgaGVpZ2h0PSIyMTMiIHJ4PSIxNyIgZmlsbD0id2hpdGUiIGZpbGwtb3BhY2l0eT0iMC41Ii8+PHJlY3QgeD0iMjcwIiB5PSIxMjIiIHdpZHRoPSI1MiIgaGVpZ2h0PSI1MCIgcng9IjEwIiBmaWxsPSJ3aGl0ZSIvPjwvc3ZnPg==";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Chains the provider serves; the capabilities map has exactly one entry per chain.
    pub chains: Vec<Chain>,
    pub announce_provider: bool,
    pub info: ProviderInfo,
    pub poll: PollConfig,
}

impl ProviderConfig {
    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            info: ProviderInfo {
                uuid: uuid.into(),
                name: PROVIDER_NAME.to_owned(),
                icon: PROVIDER_ICON.to_owned(),
                rdns: PROVIDER_RDNS.to_owned(),
            },
            ..Self::default()
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            chains: vec![Chain::new(11_155_111, "Sepolia")],
            announce_provider: false,
            info: ProviderInfo {
                uuid: String::new(),
                name: PROVIDER_NAME.to_owned(),
                icon: PROVIDER_ICON.to_owned(),
                rdns: PROVIDER_RDNS.to_owned(),
            },
            poll: PollConfig::default(),
        }
    }
}

/// Bounds for the `eth_sendTransaction` receipt wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub budget_ms: u64,
    /// Ceiling handed to the backend for a single status query.
    pub attempt_timeout_ms: u64,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            budget_ms: 5 * 60 * 1000,
            attempt_timeout_ms: 60_000,
            interval_ms: 1_000,
        }
    }
}
