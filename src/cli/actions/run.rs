use crate::cli::actions::Action;
use crate::dbclient::sqlx_client::SqlxClient;
use crate::dbclient::DatabaseClient;
use crate::emit::{http::HttpState, push, shutdown};
use crate::exporter::Exporter;
use crate::probe::linux::LinuxProbe;
use crate::probe::SystemProbe;
use crate::registry::{Registry, Service};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Handle the `Run` action: seed the Registry from `--service` entries, then
/// hand off to the pull (HTTP) or push (timer loop) Emitter depending on
/// whether `--push-url` was set.
///
/// # Errors
/// Returns an error if the pull-mode HTTP listener can't bind.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Run {
        listen,
        services,
        project_id,
        push_url,
        push_interval,
        scrape_timeout,
        exclude_databases,
    } = action
    else {
        anyhow::bail!("handle() called with a non-Run action");
    };

    let registry = Arc::new(Registry::new());
    let host = hostname();

    for (i, spec) in services.into_iter().enumerate() {
        let pid = u32::try_from(i + 1).unwrap_or(u32::MAX);
        let service_id = format!("{}-{pid}", spec.kind);
        let exporter = Arc::new(Exporter::with_cycle_budget(
            spec.kind,
            service_id.clone(),
            project_id.clone(),
            host.clone(),
            scrape_timeout,
        ));

        registry.add(
            Service {
                kind: spec.kind,
                service_id,
                project_id: project_id.clone(),
                endpoint: spec.endpoint,
                pid,
            },
            exporter,
        );
    }

    info!(services = registry.list().len(), "registered services");

    let dbclient: Arc<dyn DatabaseClient> = Arc::new(SqlxClient);
    let probe: Arc<dyn SystemProbe> = Arc::new(LinuxProbe::default());

    if let Some(push_url) = push_url {
        push::run(
            &registry,
            dbclient.as_ref(),
            probe.as_ref(),
            &push_url,
            push_interval,
            project_id.as_deref(),
            &exclude_databases,
            shutdown::shutdown_signal_handler(),
        )
        .await;
        return Ok(());
    }

    let state = Arc::new(HttpState {
        registry,
        dbclient,
        probe,
        project_id,
        exclude_databases,
    });

    emit_serve(&listen, state).await
}

async fn emit_serve(listen: &str, state: Arc<HttpState>) -> Result<()> {
    crate::emit::http::serve(listen, state, crate::emit::shutdown::shutdown_signal_handler()).await
}
