//! Pull-mode HTTP surface (spec §5): `/metrics` drives one collection cycle
//! across every registered service and renders the result; `/health` reports
//! registry size and per-service failure counts. Grounded in the teacher's
//! `src/exporter/mod.rs` router shape (`tower-http` trace/request-id layers,
//! `axum::Extension`-based shared state).

use crate::dbclient::DatabaseClient;
use crate::emit::render;
use crate::orchestrator;
use crate::probe::SystemProbe;
use crate::registry::Registry;
use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, instrument, Span};
use ulid::Ulid;

pub struct HttpState {
    pub registry: Arc<Registry>,
    pub dbclient: Arc<dyn DatabaseClient>,
    pub probe: Arc<dyn SystemProbe>,
    pub project_id: Option<String>,
    pub exclude_databases: Vec<String>,
}

/// Start the pull-mode HTTP server. Runs until `shutdown` resolves.
///
/// # Errors
/// Returns an error if the listen address can't be bound.
pub async fn serve(listen: &str, state: Arc<HttpState>, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static("x-request-id")))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        );

    let listener = TcpListener::bind(listen).await?;
    info!(listen, "pull-mode HTTP server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");
    debug_span!("http-request", path, request_id)
}

#[instrument(skip(state), fields(http.route = "/metrics"))]
async fn metrics(Extension(state): Extension<Arc<HttpState>>) -> impl IntoResponse {
    let collected = orchestrator::collect_all(
        &state.registry,
        state.dbclient.as_ref(),
        state.probe.as_ref(),
        &state.exclude_databases,
    )
    .await;

    let body = render::render(state.project_id.as_deref(), &collected);
    (StatusCode::OK, [("content-type", "text/plain; charset=utf-8")], body)
}

#[derive(Serialize)]
struct Health {
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    version: String,
    registered_services: usize,
    services: Vec<ServiceHealth>,
}

#[derive(Serialize)]
struct ServiceHealth {
    service_id: String,
    failures: u32,
}

#[instrument(skip(state), fields(http.route = "/health"))]
async fn health(Extension(state): Extension<Arc<HttpState>>) -> impl IntoResponse {
    let services: Vec<ServiceHealth> = state
        .registry
        .list()
        .into_iter()
        .map(|(service, exporter)| ServiceHealth {
            service_id: service.service_id,
            failures: exporter.failure_count(),
        })
        .collect();

    let commit = (crate::GIT_COMMIT_HASH != ":-(").then(|| crate::GIT_COMMIT_HASH.to_string());
    let body = Health {
        commit,
        version: env!("CARGO_PKG_VERSION").to_string(),
        registered_services: services.len(),
        services,
    };
    (StatusCode::OK, axum::Json(body))
}
