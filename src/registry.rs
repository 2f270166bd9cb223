//! Service Registry (spec §3, §6): the set of monitored services and their
//! bound Exporters. An Exporter exists for exactly the lifetime of its
//! Service in the registry; removing a Service unregisters its Exporter.

use crate::catalog::ServiceKind;
use crate::dbclient::Endpoint;
use crate::exporter::Exporter;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// A monitored entity (spec §3, "Service").
#[derive(Clone)]
pub struct Service {
    pub kind: ServiceKind,
    pub service_id: String,
    pub project_id: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub pid: u32,
}

struct Entry {
    service: Service,
    exporter: Arc<Exporter>,
}

/// `list()` / `add()` / `remove()` (spec §6, "Registry contract"). The
/// Emitter enumerates services by calling [`Registry::list`] at scrape
/// time, so removing an entry here is by itself sufficient to unregister
/// its Exporter from the pull/push paths.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<u32, Entry>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service together with the Exporter bound to it.
    pub fn add(&self, service: Service, exporter: Arc<Exporter>) {
        let pid = service.pid;
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(pid, Entry { service, exporter });
    }

    /// Current services together with their Exporters, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<(Service, Arc<Exporter>)> {
        let entries = self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .values()
            .map(|e| (e.service.clone(), Arc::clone(&e.exporter)))
            .collect()
    }

    /// Remove a service by pid, dropping its Exporter reference. Returns
    /// whether an entry was actually present.
    pub fn remove(&self, pid: u32) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let removed = entries.remove(&pid).is_some();
        if removed {
            info!(pid, "removed service from registry after repeated failures");
        }
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::exporter::Exporter;

    fn service(pid: u32) -> Service {
        Service {
            kind: ServiceKind::System,
            service_id: format!("svc-{pid}"),
            project_id: None,
            endpoint: None,
            pid,
        }
    }

    #[test]
    fn add_then_list_returns_the_service() {
        let registry = Registry::new();
        let exporter = Arc::new(Exporter::new(
            ServiceKind::System,
            "svc-1".into(),
            None,
            "host-1".into(),
        ));
        registry.add(service(1), exporter);

        let services = registry.list();
        assert_eq!(services.len(), 1);
        assert_eq!(services.first().expect("one").0.pid, 1);
    }

    #[test]
    fn remove_drops_the_entry() {
        let registry = Registry::new();
        let exporter = Arc::new(Exporter::new(
            ServiceKind::System,
            "svc-1".into(),
            None,
            "host-1".into(),
        ));
        registry.add(service(1), exporter);

        assert!(registry.remove(1));
        assert!(registry.list().is_empty());
        assert!(!registry.remove(1));
    }
}
