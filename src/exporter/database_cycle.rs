//! The Database Cycle (spec §4.6): for Postgres, bootstrap a session (health
//! check, version detection, catalog adjustment, database enumeration);
//! for poolers, skip straight to the single synthetic "pgbouncer" database.
//! Then run every active descriptor once per database (cluster-shared
//! descriptors run once, on the first database that satisfies them).

use super::directory;
use crate::adjuster;
use crate::catalog::{BuiltinProbe, Catalog, SampleKind, ServiceKind, StatDescriptor};
use crate::dbclient::{DatabaseClient, Endpoint, Session};
use crate::probe::SystemProbe;
use crate::projector::{self, Sample};
use std::path::Path;
use std::time::Instant;
use tracing::warn;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    catalog: &mut Catalog,
    dbclient: &dyn DatabaseClient,
    probe: &dyn SystemProbe,
    endpoint: &Endpoint,
    service_kind: ServiceKind,
    exclude_databases: &[String],
    record_failure: &(dyn Fn() + Send + Sync),
    reset_failures: &(dyn Fn() + Send + Sync),
) -> Vec<Sample> {
    let mut samples = Vec::new();

    let mut data_directory = None;
    let mut log_directory_setting = None;

    let databases = if service_kind == ServiceKind::Postgres {
        let mut bootstrap = match dbclient.open(endpoint).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "bootstrap session failed to open");
                record_failure();
                return samples;
            }
        };

        if let Err(err) = bootstrap.query("SELECT 1").await {
            warn!(error = %err, "bootstrap session health check failed");
            record_failure();
            bootstrap.close().await;
            return samples;
        }

        match bootstrap.version().await {
            Ok(version) => adjuster::adjust(catalog, version),
            Err(err) => {
                warn!(error = %err, "failed to read server version, skipping adjustment");
                record_failure();
            }
        }

        if let Ok(result) = bootstrap
            .query("SELECT name, setting FROM pg_settings WHERE name IN ('data_directory', 'log_directory')")
            .await
        {
            for row in result.rows() {
                let name = row.first().and_then(Option::as_ref);
                let setting = row.get(1).and_then(Option::as_ref);
                match (name.map(String::as_str), setting) {
                    (Some("data_directory"), Some(v)) => data_directory = Some(v.clone()),
                    (Some("log_directory"), Some(v)) => log_directory_setting = Some(v.clone()),
                    _ => {}
                }
            }
        }

        let databases = list_user_databases(bootstrap.as_mut(), &endpoint.database, exclude_databases).await;
        bootstrap.close().await;
        databases
    } else {
        vec!["pgbouncer".to_string()]
    };

    let now = Instant::now();
    for descriptor in &mut catalog.descriptors {
        descriptor.active = descriptor.service_kind == service_kind && descriptor.schedule.active_now(now);
        descriptor.collect_done = false;
    }

    for database in &databases {
        let db_endpoint = Endpoint {
            database: database.clone(),
            ..endpoint.clone()
        };

        let mut session = match dbclient.open(&db_endpoint).await {
            Ok(s) => s,
            Err(err) => {
                warn!(database = database.as_str(), error = %err, "per-database session failed to open");
                record_failure();
                continue;
            }
        };

        run_descriptors(
            catalog,
            session.as_mut(),
            probe,
            data_directory.as_deref(),
            log_directory_setting.as_deref(),
            &mut samples,
            reset_failures,
        )
        .await;

        session.close().await;
    }

    let now = Instant::now();
    for descriptor in &mut catalog.descriptors {
        if descriptor.collect_done {
            descriptor.schedule.mark_fired(now);
        }
    }

    samples
}

#[allow(clippy::too_many_arguments)]
async fn run_descriptors(
    catalog: &mut Catalog,
    session: &mut dyn Session,
    probe: &dyn SystemProbe,
    data_directory: Option<&str>,
    log_directory_setting: Option<&str>,
    samples: &mut Vec<Sample>,
    reset_failures: &(dyn Fn() + Send + Sync),
) {
    for descriptor in &mut catalog.descriptors {
        if !descriptor.active || (descriptor.oneshot && descriptor.collect_done) {
            continue;
        }

        if let Some(builtin) = descriptor.builtin {
            if collect_builtin(descriptor, builtin, probe, data_directory, log_directory_setting, samples) {
                descriptor.collect_done = true;
                reset_failures();
            }
            continue;
        }

        if descriptor.name == "pg_stat_statements" && !extension_installed(session, "pg_stat_statements").await {
            continue;
        }

        match session.query(descriptor.query).await {
            Ok(result) => {
                let projection = projector::project(descriptor, &result);
                if projection.collected() {
                    descriptor.collect_done = true;
                    reset_failures();
                    samples.extend(projection.samples);
                }
            }
            Err(err) => {
                warn!(descriptor = descriptor.name, error = %err, "descriptor query failed");
            }
        }
    }
}

fn collect_builtin(
    descriptor: &StatDescriptor,
    builtin: BuiltinProbe,
    probe: &dyn SystemProbe,
    data_directory: Option<&str>,
    log_directory_setting: Option<&str>,
    samples: &mut Vec<Sample>,
) -> bool {
    let Some(data_dir) = data_directory else {
        return false;
    };

    let target_path = match builtin {
        BuiltinProbe::PgDataDirectory => data_dir.to_string(),
        BuiltinProbe::PgWalDirectory => directory::wal_directory(data_dir, descriptor.wal_subdir),
        BuiltinProbe::PgLogDirectory => directory::log_directory(data_dir, log_directory_setting.unwrap_or("log")),
    };

    let Ok(mounts) = probe.read_mounts() else {
        return false;
    };

    let (device, mountpoint) = directory::resolve(Path::new(&target_path), &mounts);
    samples.push(Sample {
        metric_name: descriptor.metric_name(Some("value")),
        kind: SampleKind::Gauge,
        value: 1.0,
        label_values: vec![device, mountpoint, target_path],
    });
    true
}

async fn extension_installed(session: &mut dyn Session, extname: &str) -> bool {
    let query = format!("SELECT 1 FROM pg_extension WHERE extname = '{extname}'");
    matches!(session.query(&query).await, Ok(result) if result.row_count() > 0)
}

async fn list_user_databases(session: &mut dyn Session, default_database: &str, exclude: &[String]) -> Vec<String> {
    let result = session
        .query("SELECT datname FROM pg_database WHERE datallowconn AND NOT datistemplate")
        .await;

    match result {
        Ok(result) => {
            let names: Vec<String> = result
                .rows()
                .iter()
                .filter_map(|row| row.first().and_then(Option::as_ref).cloned())
                .filter(|name| !exclude.contains(name))
                .collect();
            if names.is_empty() {
                vec![default_database.to_string()]
            } else {
                names
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to list databases, falling back to configured default");
            vec![default_database.to_string()]
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dbclient::DbError;
    use crate::query_result::{ColumnDescription, QueryResult};
    use futures::future::BoxFuture;
    use secrecy::SecretString;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: SecretString::from("secret".to_string()),
            database: "postgres".into(),
        }
    }

    struct NullProbe;
    impl SystemProbe for NullProbe {
        fn read_cpu_stat(&self) -> anyhow::Result<crate::probe::CpuStat> {
            unimplemented!()
        }
        fn read_memory(&self) -> anyhow::Result<crate::probe::MemoryStat> {
            unimplemented!()
        }
        fn read_diskstats(&self) -> anyhow::Result<Vec<crate::probe::DiskStat>> {
            unimplemented!()
        }
        fn read_netdev(&self) -> anyhow::Result<Vec<crate::probe::NetDevStat>> {
            unimplemented!()
        }
        fn read_filesystems(&self) -> anyhow::Result<Vec<crate::probe::FilesystemStat>> {
            unimplemented!()
        }
        fn read_mounts(&self) -> anyhow::Result<HashMap<String, String>> {
            let mut mounts = HashMap::new();
            mounts.insert("/".to_string(), "/dev/sda1".to_string());
            Ok(mounts)
        }
        fn get_sysctl(&self, _name: &str) -> anyhow::Result<i64> {
            unimplemented!()
        }
        fn count_cpus(&self) -> anyhow::Result<crate::probe::CpuCounts> {
            unimplemented!()
        }
        fn count_scaling_governors(&self) -> anyhow::Result<HashMap<String, u32>> {
            unimplemented!()
        }
        fn count_numa_nodes(&self) -> anyhow::Result<u32> {
            unimplemented!()
        }
        fn enumerate_block_devices(&self) -> anyhow::Result<Vec<crate::probe::BlockDevice>> {
            unimplemented!()
        }
        fn read_uptime_seconds(&self) -> anyhow::Result<f64> {
            unimplemented!()
        }
    }

    struct FakeSession {
        version: u32,
    }

    impl Session for FakeSession {
        fn version(&mut self) -> BoxFuture<'_, Result<u32, DbError>> {
            let v = self.version;
            Box::pin(async move { Ok(v) })
        }

        fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryResult, DbError>> {
            Box::pin(async move {
                if sql.contains("data_directory") {
                    QueryResult::new(
                        vec![ColumnDescription { name: "name".into(), type_oid: 19 }, ColumnDescription { name: "setting".into(), type_oid: 19 }],
                        vec![
                            vec![Some("data_directory".into()), Some("/var/lib/pg/data".into())],
                            vec![Some("log_directory".into()), Some("log".into())],
                        ],
                    )
                    .map_err(DbError::from)
                } else if sql.contains("pg_database") {
                    QueryResult::new(
                        vec![ColumnDescription { name: "datname".into(), type_oid: 19 }],
                        vec![vec![Some("appdb".into())]],
                    )
                    .map_err(DbError::from)
                } else if sql.contains("pg_stat_user_tables") {
                    QueryResult::new(
                        vec![
                            ColumnDescription { name: "relname".into(), type_oid: 19 },
                            ColumnDescription { name: "seq_scan".into(), type_oid: 20 },
                        ],
                        vec![vec![Some("accounts".into()), Some("4".into())]],
                    )
                    .map_err(DbError::from)
                } else {
                    QueryResult::new(vec![], vec![]).map_err(DbError::from)
                }
            })
        }

        fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    struct FakeClient {
        opens: AtomicU32,
    }

    impl DatabaseClient for FakeClient {
        fn open<'a>(&'a self, _endpoint: &'a Endpoint) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>> {
            self.opens.fetch_add(1, Ordering::Relaxed);
            Box::pin(async { Ok(Box::new(FakeSession { version: 160_000 }) as Box<dyn Session>) })
        }
    }

    #[tokio::test]
    async fn database_cycle_emits_samples_from_per_database_descriptors() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        let client = FakeClient { opens: AtomicU32::new(0) };
        let probe = NullProbe;
        let failures = Mutex::new(0_u32);

        let samples = run(
            &mut catalog,
            &client,
            &probe,
            &endpoint(),
            ServiceKind::Postgres,
            &[],
            &|| *failures.lock().expect("lock") += 1,
            &|| {},
        )
        .await;

        assert!(samples.iter().any(|s| s.metric_name == "pg_stat_user_tables_seq_scan"));
    }

    #[tokio::test]
    async fn cluster_shared_descriptor_runs_once_even_with_multiple_databases() {
        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        let client = FakeClient { opens: AtomicU32::new(0) };
        let probe = NullProbe;

        let samples = run(
            &mut catalog,
            &client,
            &probe,
            &endpoint(),
            ServiceKind::Postgres,
            &[],
            &|| {},
            &|| {},
        )
        .await;

        // pg_data_directory is a builtin, oneshot descriptor: at most one sample.
        let data_dir_samples = samples.iter().filter(|s| s.metric_name == "pg_data_directory_value").count();
        assert_eq!(data_dir_samples, 1);
    }

    #[tokio::test]
    async fn failed_bootstrap_open_records_a_failure_and_returns_no_samples() {
        struct FailingClient;
        impl DatabaseClient for FailingClient {
            fn open<'a>(&'a self, _endpoint: &'a Endpoint) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>> {
                Box::pin(async { Err(DbError::Unreachable("down".into())) })
            }
        }

        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        let probe = NullProbe;
        let failures = Mutex::new(0_u32);

        let samples = run(
            &mut catalog,
            &FailingClient,
            &probe,
            &endpoint(),
            ServiceKind::Postgres,
            &[],
            &|| *failures.lock().expect("lock") += 1,
            &|| {},
        )
        .await;

        assert!(samples.is_empty());
        assert_eq!(*failures.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn failed_health_check_records_a_failure_and_returns_no_samples() {
        struct UnhealthySession;
        impl Session for UnhealthySession {
            fn version(&mut self) -> BoxFuture<'_, Result<u32, DbError>> {
                Box::pin(async { Ok(160_000) })
            }
            fn query<'a>(&'a mut self, _sql: &'a str) -> BoxFuture<'a, Result<QueryResult, DbError>> {
                Box::pin(async { Err(DbError::Unreachable("connection reset".into())) })
            }
            fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
                Box::pin(async {})
            }
        }

        struct UnhealthyClient;
        impl DatabaseClient for UnhealthyClient {
            fn open<'a>(&'a self, _endpoint: &'a Endpoint) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>> {
                Box::pin(async { Ok(Box::new(UnhealthySession) as Box<dyn Session>) })
            }
        }

        let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
        let probe = NullProbe;
        let failures = Mutex::new(0_u32);

        let samples = run(
            &mut catalog,
            &UnhealthyClient,
            &probe,
            &endpoint(),
            ServiceKind::Postgres,
            &[],
            &|| *failures.lock().expect("lock") += 1,
            &|| {},
        )
        .await;

        assert!(samples.is_empty());
        assert_eq!(*failures.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn pgbouncer_cycle_always_opens_the_synthetic_pgbouncer_database() {
        struct RecordingClient {
            databases_opened: Mutex<Vec<String>>,
        }
        impl DatabaseClient for RecordingClient {
            fn open<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>> {
                self.databases_opened.lock().expect("lock").push(endpoint.database.clone());
                Box::pin(async { Ok(Box::new(FakeSession { version: 160_000 }) as Box<dyn Session>) })
            }
        }

        let mut catalog = Catalog::for_kind(ServiceKind::Pgbouncer);
        let client = RecordingClient { databases_opened: Mutex::new(Vec::new()) };
        let probe = NullProbe;

        let mut endpoint = endpoint();
        endpoint.database = "mypool".to_string();

        let _samples = run(&mut catalog, &client, &probe, &endpoint, ServiceKind::Pgbouncer, &[], &|| {}, &|| {}).await;

        let opened = client.databases_opened.lock().expect("lock");
        assert!(
            opened.iter().all(|d| d == "pgbouncer"),
            "expected every session to open against the synthetic 'pgbouncer' database, got: {opened:?}"
        );
    }
}
