//! HTTP surface: `POST /generate-pdf`, health, and API documentation

use crate::docs::{self, DOCS_PATH, OPENAPI_PATH};
use crate::{Config, RenderError, RenderRequest, RenderResult, RenderService};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Everything a request handler needs, built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RenderService>,
    pub config: Arc<Config>,
    openapi: Arc<Value>,
    metrics: Option<PrometheusHandle>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<RenderService>) -> Self {
        let openapi = docs::openapi_document(&config.server_url());
        Self {
            service,
            config: Arc::new(config),
            openapi: Arc::new(openapi),
            metrics: None,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Expose the recorder behind `handle` on `GET /metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate-pdf", post(generate_pdf))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route(DOCS_PATH, get(docs_page))
        .route(OPENAPI_PATH, get(openapi_json))
        .route("/api-docs", get(|| async { Redirect::permanent(DOCS_PATH) }))
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn generate_pdf(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match RenderRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected request body: {}", e);
            return e.into_response();
        }
    };

    match state.service.render(request).await {
        Ok(result) => pdf_response(result),
        Err(e) => e.into_response(),
    }
}

fn pdf_response(result: RenderResult) -> Response {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, RenderResult::CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, result.content_disposition())
        .header(header::CONTENT_LENGTH, result.content_length())
        .body(Body::from(result.data));

    match response {
        Ok(response) => response,
        Err(e) => RenderError::InternalFault(format!("failed to build response: {e}"))
            .into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub in_flight: usize,
    pub started_at: DateTime<Utc>,
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started.elapsed().as_secs(),
        in_flight: state.service.in_flight(),
        started_at: state.started_at,
    })
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn docs_page() -> Html<String> {
    Html(docs::swagger_ui_html())
}

async fn openapi_json(State(state): State<AppState>) -> Json<Value> {
    Json(state.openapi.as_ref().clone())
}

/// Permissive CORS: any origin may call the API from a browser.
async fn cors(request: Request<Body>, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() || status.is_client_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "request failed");
    } else {
        info!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "request completed");
    }

    response
}

/// Serve until `signal` resolves, then let in-flight requests drain for at
/// most `grace`.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    grace: Duration,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopping = Arc::new(Notify::new());
    let notifier = stopping.clone();

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Stopped accepting connections, draining in-flight requests");
            notifier.notify_one();
        })
        .into_future();

    let drain_deadline = async {
        stopping.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result,
        _ = drain_deadline => {
            warn!("Drain grace period of {:?} expired, exiting with requests in flight", grace);
            Ok(())
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
