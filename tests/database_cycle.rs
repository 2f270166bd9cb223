//! End-to-end Database Cycle test against a real `PostgreSQL` container.
//! Mirrors the teacher's `tests/collectors/default/*.rs` shape (spin up a
//! real database, run a collector, assert on the emitted samples) but one
//! level up: this exercises the whole [`pg_host_agent::exporter::database_cycle`]
//! pass rather than a single hand-written collector.
//!
//! Expensive and network-dependent, so `#[ignore]`d by default; run with
//! `cargo test --test database_cycle -- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pg_host_agent::catalog::{Catalog, ServiceKind};
use pg_host_agent::dbclient::sqlx_client::SqlxClient;
use pg_host_agent::dbclient::Endpoint;
use pg_host_agent::exporter::database_cycle;
use pg_host_agent::probe::linux::LinuxProbe;
use secrecy::SecretString;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn database_cycle_collects_real_postgres_stats() {
    let container = Postgres::default().start().await.expect("start postgres container");
    let port = container.get_host_port_ipv4(5432).await.expect("mapped port");

    let endpoint = Endpoint {
        host: "127.0.0.1".to_string(),
        port,
        user: "postgres".to_string(),
        password: SecretString::from("postgres"),
        database: "postgres".to_string(),
    };

    let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
    let client = SqlxClient;
    let probe = LinuxProbe::new("/nonexistent-proc", "/nonexistent-sys");

    let samples = database_cycle::run(
        &mut catalog,
        &client,
        &probe,
        &endpoint,
        ServiceKind::Postgres,
        &[],
        &|| {},
        &|| {},
    )
    .await;

    assert!(
        samples.iter().any(|s| s.metric_name == "pg_stat_bgwriter_buffers_alloc"),
        "expected a pg_stat_bgwriter sample, got: {:?}",
        samples.iter().map(|s| s.metric_name.clone()).collect::<Vec<_>>()
    );
    assert!(
        samples.iter().any(|s| s.metric_name == "pg_stat_activity_count"),
        "expected a pg_stat_activity sample"
    );
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn database_cycle_against_empty_database_finds_no_user_tables() {
    let container = Postgres::default().start().await.expect("start postgres container");
    let port = container.get_host_port_ipv4(5432).await.expect("mapped port");

    let endpoint = Endpoint {
        host: "127.0.0.1".to_string(),
        port,
        user: "postgres".to_string(),
        password: SecretString::from("postgres"),
        database: "postgres".to_string(),
    };

    let mut catalog = Catalog::for_kind(ServiceKind::Postgres);
    let client = SqlxClient;
    let probe = LinuxProbe::new("/nonexistent-proc", "/nonexistent-sys");

    let samples = database_cycle::run(
        &mut catalog,
        &client,
        &probe,
        &endpoint,
        ServiceKind::Postgres,
        &[],
        &|| {},
        &|| {},
    )
    .await;

    assert!(
        !samples.iter().any(|s| s.metric_name == "pg_stat_user_tables_seq_scan"),
        "a fresh database has no user tables to report stats for"
    );
}
