use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use batua_core::{AnnouncementId, AnnouncerPort, PortError, ProviderInfo};

/// Change in the set of announced providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Announced(ProviderInfo),
    Withdrawn(ProviderInfo),
}

type DiscoverySink = Arc<dyn Fn(&DiscoveryEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    announced: BTreeMap<u64, ProviderInfo>,
}

/// EIP-6963 style announcement registry. An optional sink is told about every
/// announcement so a host can relay it to applications.
#[derive(Clone, Default)]
pub struct DiscoveryRegistry {
    inner: Arc<Mutex<Registry>>,
    sink: Option<DiscoverySink>,
}

impl std::fmt::Debug for DiscoveryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRegistry")
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl DiscoveryRegistry {
    pub fn with_sink(sink: impl Fn(&DiscoveryEvent) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::default(),
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn announced(&self) -> Result<Vec<ProviderInfo>, PortError> {
        Ok(self.lock()?.announced.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("discovery lock poisoned: {e}")))
    }

    fn notify(&self, event: DiscoveryEvent) {
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }
}

impl AnnouncerPort for DiscoveryRegistry {
    fn announce(&self, info: &ProviderInfo) -> Result<AnnouncementId, PortError> {
        if info.uuid.is_empty() {
            return Err(PortError::Validation("provider uuid must be set".to_owned()));
        }
        let id = {
            let mut g = self.lock()?;
            if g.announced.values().any(|x| x.uuid == info.uuid) {
                return Err(PortError::Validation(format!(
                    "provider {} already announced",
                    info.uuid
                )));
            }
            g.next_id = g.next_id.saturating_add(1);
            let id = g.next_id;
            g.announced.insert(id, info.clone());
            id
        };
        info!(uuid = %info.uuid, rdns = %info.rdns, "provider announced");
        self.notify(DiscoveryEvent::Announced(info.clone()));
        Ok(AnnouncementId(id))
    }

    fn withdraw(&self, id: AnnouncementId) -> Result<(), PortError> {
        let info = self
            .lock()?
            .announced
            .remove(&id.0)
            .ok_or_else(|| PortError::NotFound(format!("announcement {}", id.0)))?;
        info!(uuid = %info.uuid, "provider announcement withdrawn");
        self.notify(DiscoveryEvent::Withdrawn(info));
        Ok(())
    }
}
