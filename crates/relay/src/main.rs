mod api;
mod config;
mod cors;
mod error;
mod metrics;
mod registry;
mod ws;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    config::{LogFormat, RelayConfig},
    error::{
        attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope,
        ErrorCode, RelayError,
    },
    metrics::RelayMetrics,
    ws::SignalRelay,
};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct OpsState {
    relay: Arc<SignalRelay>,
    metrics: Arc<RelayMetrics>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env();
    init_tracing(&config)?;

    let relay = Arc::new(SignalRelay::default());
    let relay_metrics = Arc::new(RelayMetrics::default());
    metrics::set_global_metrics(Arc::clone(&relay_metrics));

    let app = build_router(relay, relay_metrics, &config);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", config.listen_addr))?;

    info!(
        listen_addr = %config.listen_addr,
        max_frame_bytes = config.max_frame_bytes,
        "starting signaling relay"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server exited unexpectedly")
}

fn init_tracing(config: &RelayConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("invalid log filter `{}`", config.log_filter))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|error| anyhow::anyhow!(error))
    .context("failed to install tracing subscriber")
}

fn build_router(
    relay: Arc<SignalRelay>,
    relay_metrics: Arc<RelayMetrics>,
    config: &RelayConfig,
) -> Router {
    let ops = OpsState { relay: Arc::clone(&relay), metrics: relay_metrics };

    apply_middleware(
        Router::new()
            .route("/", get(root))
            .route("/api/health", get(api_health))
            .route("/healthz", get(healthz))
            .route("/metrics", get(metrics_endpoint))
            .with_state(ops)
            .merge(api::router(Arc::clone(&relay)))
            .merge(ws::router(relay, config.max_frame_bytes))
            .fallback(not_found),
        config,
    )
}

fn apply_middleware(router: Router, config: &RelayConfig) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
        .layer(cors::cors_layer(config.cors_origins.as_deref()))
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Signaling relay is running",
        "docs": "/api/health",
    }))
}

async fn api_health() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "Server is running" }))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn metrics_endpoint(State(ops): State<OpsState>) -> Response {
    let stats = ops.relay.stats().await;
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        ops.metrics.render_prometheus(stats),
    )
        .into_response()
}

async fn not_found() -> RelayError {
    RelayError::from_code(ErrorCode::NotFound)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(?error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(?error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            RelayError::from_code(ErrorCode::InternalError).into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    let latency_ms = started_at.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    metrics::record_http_request(method.as_str(), &path, status, latency_ms);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms,
        "request completed"
    );

    response
}
