//! eventgate turns Event Grid and CloudEvents webhooks into build triggers.

#![forbid(unsafe_code)]

pub mod cloudevents;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod eventgrid;
mod router;
pub mod store;
pub mod telemetry;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use config::Configuration;
use store::memory::MemoryStore;
use store::{BuildStore, ProjectStore};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: axum::http::Method,
    path: &str,
    headers: &[(&str, &str)],
    body: impl Into<axum::body::Body>,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    app.oneshot(request.body(body.into()).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub projects: Arc<dyn ProjectStore>,
    pub builds: Arc<dyn BuildStore>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new [`AppState`] without a metrics endpoint.
    pub fn new(
        config: Arc<Configuration>,
        projects: Arc<dyn ProjectStore>,
        builds: Arc<dyn BuildStore>,
    ) -> Self {
        Self {
            config,
            projects,
            builds,
            metrics: None,
        }
    }

    /// Serve `GET /metrics` from `handle`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.timeout_secs),
        ))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]));

    let mut routes = Router::new()
        // `GET /healthz` goes to `healthz`.
        .route("/healthz", get(router::status::healthz))
        // `POST /eventgrid/{project}` with an optional token segment.
        .route("/eventgrid/{project}", post(router::eventgrid::handler))
        .route("/eventgrid/{project}/{token}", post(router::eventgrid::handler))
        .route(
            "/cloudevents/v0.1/{project}/{token}",
            post(router::cloudevents::handler),
        );

    if let Some(handle) = state.metrics.clone() {
        routes = routes.route(
            "/metrics",
            get(move || std::future::ready(handle.render())),
        );
    }

    routes
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
///
/// Projects come from the configuration. Builds stay in memory, the most
/// recent `build_history` of them.
pub fn initialize_state(config: Arc<Configuration>) -> AppState {
    let store = Arc::new(
        MemoryStore::new(config.projects.clone()).with_history(config.build_history),
    );
    tracing::info!(
        projects = config.projects.len(),
        build_history = config.build_history,
        "loaded project registry"
    );

    AppState::new(config, store.clone(), store)
}
