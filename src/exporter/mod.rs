//! The Exporter (spec §4.5): the per-service engine. Holds a local catalog
//! snapshot, a failure counter, and drives either the Database Cycle or the
//! System Cycle depending on service kind.

pub mod database_cycle;
mod directory;
mod system_cycle;

use crate::catalog::{Catalog, MetricDescriptor, ServiceKind};
use crate::dbclient::{DatabaseClient, Endpoint};
use crate::probe::SystemProbe;
use crate::projector::Sample;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{instrument, warn};

/// Per-Exporter failure threshold before the Registry is asked to remove
/// the service (spec §4.10).
pub const FAILURE_THRESHOLD: u32 = 10;

/// Wall-clock budget for one `collect()` call (spec §5).
pub const CYCLE_BUDGET: Duration = Duration::from_secs(30);

pub struct Exporter {
    service_kind: ServiceKind,
    service_id: String,
    project_id: Option<String>,
    hostname: String,
    catalog: Mutex<Catalog>,
    metric_descriptors: Vec<MetricDescriptor>,
    failure_count: AtomicU32,
    cycle_budget: Duration,
}

impl Exporter {
    /// Builds an Exporter with the default collection-cycle wall-clock
    /// budget ([`CYCLE_BUDGET`]). Use [`Exporter::with_cycle_budget`] to
    /// override it from `--scrape-timeout`.
    #[must_use]
    pub fn new(
        service_kind: ServiceKind,
        service_id: String,
        project_id: Option<String>,
        hostname: String,
    ) -> Self {
        Self::with_cycle_budget(service_kind, service_id, project_id, hostname, CYCLE_BUDGET)
    }

    #[must_use]
    pub fn with_cycle_budget(
        service_kind: ServiceKind,
        service_id: String,
        project_id: Option<String>,
        hostname: String,
        cycle_budget: Duration,
    ) -> Self {
        let catalog = Catalog::for_kind(service_kind);
        let metric_descriptors = catalog.metric_descriptors();
        Self {
            service_kind,
            service_id,
            project_id,
            hostname,
            catalog: Mutex::new(catalog),
            metric_descriptors,
            failure_count: AtomicU32::new(0),
            cycle_budget,
        }
    }

    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Invariant 1 (spec §8): every possible emitted sample maps to one of
    /// these pre-built descriptors.
    #[must_use]
    pub fn describe(&self) -> &[MetricDescriptor] {
        &self.metric_descriptors
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn reset_failures(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    /// Drive one collection cycle. `endpoint` and `dbclient` are ignored for
    /// system services; `probe` is ignored for postgres/pooler services
    /// (spec §4.5, operation `collect()`).
    #[instrument(skip(self, dbclient, probe), fields(service = %self.service_id))]
    pub async fn collect(
        &self,
        dbclient: &dyn DatabaseClient,
        probe: &dyn SystemProbe,
        endpoint: Option<&Endpoint>,
        exclude_databases: &[String],
    ) -> Vec<Sample> {
        let mut catalog = self.catalog.lock().await;

        let run = async {
            match self.service_kind {
                ServiceKind::System => system_cycle::run(&mut catalog, probe),
                ServiceKind::Postgres | ServiceKind::Pgbouncer => {
                    let Some(endpoint) = endpoint else {
                        warn!("postgres/pgbouncer service has no endpoint configured");
                        return Vec::new();
                    };
                    database_cycle::run(
                        &mut catalog,
                        dbclient,
                        probe,
                        endpoint,
                        self.service_kind,
                        exclude_databases,
                        &|| self.record_failure(),
                        &|| self.reset_failures(),
                    )
                    .await
                }
                ServiceKind::Patroni | ServiceKind::Disabled => Vec::new(),
            }
        };

        if let Ok(samples) = timeout(self.cycle_budget, run).await {
            samples
        } else {
            warn!("collection cycle exceeded its wall-clock budget, aborting");
            self.record_failure();
            Vec::new()
        }
    }
}
