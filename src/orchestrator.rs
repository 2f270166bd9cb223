//! The Collection Orchestrator (spec §2, component 8): drives one
//! `collect()` per registered service per cycle, and evicts services whose
//! Exporter has crossed the failure threshold (spec §4.10).
//!
//! Kept deliberately outside the Exporter/Registry pair: the Exporter only
//! tracks its own `failure_count()`, the Registry only knows how to
//! `list()`/`remove()` — this is the one place that reads the former to
//! decide when to call the latter, so neither needs a reference back into
//! the other.

use crate::dbclient::DatabaseClient;
use crate::exporter::{Exporter, FAILURE_THRESHOLD};
use crate::probe::SystemProbe;
use crate::projector::Sample;
use crate::registry::Registry;
use std::sync::Arc;
use tracing::info;

/// Run one collection cycle across every registered service. Services whose
/// Exporter has accumulated `FAILURE_THRESHOLD` or more consecutive failures
/// are removed from the registry after this cycle's `collect()` call.
pub async fn collect_all(
    registry: &Registry,
    dbclient: &dyn DatabaseClient,
    probe: &dyn SystemProbe,
    exclude_databases: &[String],
) -> Vec<(Arc<Exporter>, Vec<Sample>)> {
    let mut results = Vec::new();

    for (service, exporter) in registry.list() {
        let samples = exporter
            .collect(dbclient, probe, service.endpoint.as_ref(), exclude_databases)
            .await;

        if exporter.failure_count() >= FAILURE_THRESHOLD {
            info!(
                service = exporter.service_id(),
                failures = exporter.failure_count(),
                "evicting service after repeated collection failures"
            );
            registry.remove(service.pid);
        }

        results.push((exporter, samples));
    }

    results
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::ServiceKind;
    use crate::dbclient::sqlx_client::SqlxClient;
    use crate::probe::linux::LinuxProbe;
    use crate::registry::Service;

    #[tokio::test]
    async fn collects_every_registered_service() {
        let registry = Registry::new();
        let exporter = Arc::new(Exporter::new(ServiceKind::System, "sys-1".into(), None, "host-a".into()));
        registry.add(
            Service {
                kind: ServiceKind::System,
                service_id: "sys-1".into(),
                project_id: None,
                endpoint: None,
                pid: 1,
            },
            exporter,
        );

        let client = SqlxClient;
        let probe = LinuxProbe::new("/nonexistent-proc", "/nonexistent-sys");
        let results = collect_all(&registry, &client, &probe, &[]).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn never_evicts_a_healthy_service() {
        let registry = Registry::new();
        let exporter = Arc::new(Exporter::new(ServiceKind::System, "sys-1".into(), None, "host-a".into()));
        registry.add(
            Service {
                kind: ServiceKind::System,
                service_id: "sys-1".into(),
                project_id: None,
                endpoint: None,
                pid: 1,
            },
            exporter,
        );

        let client = SqlxClient;
        let probe = LinuxProbe::new("/nonexistent-proc", "/nonexistent-sys");
        collect_all(&registry, &client, &probe, &[]).await;
        assert_eq!(registry.list().len(), 1);
    }
}
