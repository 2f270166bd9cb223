//! Push mode (spec §5: "adds a timer goroutine"): periodically collects
//! every registered service and HTTP-POSTs the rendered payload to a remote
//! URL. Best-effort — a failed push is logged and retried next tick, never
//! fatal.

use crate::dbclient::DatabaseClient;
use crate::emit::render;
use crate::orchestrator;
use crate::probe::SystemProbe;
use crate::registry::Registry;
use std::time::Duration;
use tokio::time::interval;
use tracing::warn;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    registry: &Registry,
    dbclient: &dyn DatabaseClient,
    probe: &dyn SystemProbe,
    push_url: &str,
    push_interval: Duration,
    project_id: Option<&str>,
    exclude_databases: &[String],
    shutdown: impl std::future::Future<Output = ()> + Send,
) {
    let client = reqwest::Client::new();
    let mut ticker = interval(push_interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => return,
            _ = ticker.tick() => {
                let collected = orchestrator::collect_all(registry, dbclient, probe, exclude_databases).await;
                let body = render::render(project_id, &collected);

                if let Err(err) = client.post(push_url).body(body).send().await {
                    warn!(error = %err, push_url, "push to remote failed, retrying next tick");
                }
            }
        }
    }
}
