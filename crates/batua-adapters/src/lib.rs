pub mod clock;
pub mod config;
pub mod deterministic;
pub mod discovery;
pub mod network;
pub mod store;

pub use clock::SystemClock;
pub use config::{random_uuid_v4, AdapterConfig, ChainEndpoint, ConfigError};
pub use deterministic::DeterministicBackend;
pub use discovery::{DiscoveryEvent, DiscoveryRegistry};
pub use network::{HttpNetworkClient, NetworkClients};
pub use store::InMemoryStore;
