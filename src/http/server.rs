//! HTTP server setup and request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler and admin routes
//! - Wire up middleware (transport guard, timeout, request ID, tracing)
//! - Buffer and validate inbound JSON bodies
//! - Forward clean requests to the upstream backend
//! - Optionally filter upstream JSON responses through the scanner

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, Scheme},
    http::{header, HeaderValue, Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::{
    build_safe_response, PatternSet, RequestValidator, Scanner, TransportGuard,
};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<TransportGuard>,
    pub validator: Arc<RequestValidator>,
    pub scanner: Scanner,
    pub client: Client<HttpConnector, Body>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

/// HTTP server for the payload gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and registry.
    ///
    /// The registry is injected rather than rebuilt here so tests can run
    /// the full pipeline against a custom pattern set.
    pub fn new(config: GatewayConfig, patterns: Arc<PatternSet>) -> Self {
        let scanner = Scanner::new(patterns.clone(), config.scanner.max_depth);
        let validator = Arc::new(RequestValidator::new(
            scanner.clone(),
            config.scanner.max_body_bytes,
        ));
        let guard = Arc::new(TransportGuard::new(patterns));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let config = Arc::new(config);
        let state = AppState {
            guard,
            validator,
            scanner,
            client,
            config: config.clone(),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler));

        if config.admin.enabled {
            router = router.route(
                "/admin/status",
                get(admin::handlers::get_status).layer(middleware::from_fn_with_state(
                    state.clone(),
                    admin::auth::admin_auth_middleware,
                )),
            );
        }

        router
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state,
                transport_guard_middleware,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Shuts down on Ctrl+C or when the shutdown receiver fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let app = self.router.into_make_service();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Shutdown requested");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Transport guard middleware.
///
/// Runs before any body is read. A decision short-circuits the request with
/// the decision's status and fixed JSON shape.
async fn transport_guard_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.guard.enabled {
        return next.run(request).await;
    }

    if let Some(decision) = state.guard.check(request.headers(), request.uri()) {
        tracing::warn!(
            uri = %request.uri(),
            message = %decision.message,
            "Transport guard blocked request"
        );
        metrics::record_blocked("transport");
        return (
            decision.status,
            Json(json!({
                "error": decision.error,
                "message": decision.message,
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Main gateway handler.
/// Validates the body, then forwards the request upstream.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Handling request"
    );

    let (parts, body) = request.into_parts();

    // Buffer the body, bounded by the scanner ceiling. The exact
    // serialized-size check happens in the validator; this bound keeps a
    // hostile stream from exhausting memory first.
    let body_bytes = match axum::body::to_bytes(body, state.validator.max_body_bytes()).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!(request_id = %request_id, "Request body exceeded size ceiling");
            metrics::record_blocked("size");
            metrics::record_request(method.as_str(), 400, start_time);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response();
        }
    };

    if is_json(&parts.headers) && !body_bytes.is_empty() {
        let parsed: Value = match serde_json::from_slice(&body_bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "Malformed JSON body");
                metrics::record_request(method.as_str(), 400, start_time);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid JSON body" })),
                )
                    .into_response();
            }
        };

        let verdict = state.validator.validate(&parsed);
        if !verdict.is_valid {
            let error = verdict.error.unwrap_or_else(|| "Invalid request".to_string());
            // Findings are logged for the operator, never echoed back.
            if let Some(details) = &verdict.details {
                tracing::warn!(
                    request_id = %request_id,
                    path = %path,
                    dangerous_keys = ?details.dangerous_keys,
                    dangerous_values = ?details.dangerous_values,
                    "Rejected dangerous payload"
                );
            } else {
                tracing::warn!(
                    request_id = %request_id,
                    path = %path,
                    error = %error,
                    "Rejected payload"
                );
            }
            metrics::record_blocked("payload");
            metrics::record_request(method.as_str(), 400, start_time);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response();
        }
    }

    // Construct the upstream request.
    let mut builder = Request::builder()
        .method(method.clone())
        .version(parts.version);
    if let Some(headers) = builder.headers_mut() {
        for (k, v) in parts.headers.iter() {
            headers.insert(k.clone(), v.clone());
        }
        if let Ok(id) = HeaderValue::from_str(&request_id) {
            headers.insert(X_REQUEST_ID, id);
        }
    }

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    if let Ok(authority) = Authority::from_str(&state.config.upstream.address) {
        uri_parts.authority = Some(authority);
    }
    let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let upstream_request = match builder.uri(uri).body(Body::from(body_bytes)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
            metrics::record_request(method.as_str(), 500, start_time);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal error" })),
            )
                .into_response();
        }
    };

    match state.client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(method.as_str(), status.as_u16(), start_time);

            if state.config.scanner.scan_responses {
                return filter_upstream_response(&state, &request_id, response).await;
            }

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), 502, start_time);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream request failed" })),
            )
                .into_response()
        }
    }
}

/// Filter a JSON upstream response through the scanner.
///
/// Safe bodies pass through byte-identical. Unsafe bodies are replaced with
/// an envelope that omits the data; the findings go to the log only.
async fn filter_upstream_response(
    state: &AppState,
    request_id: &str,
    response: hyper::Response<hyper::body::Incoming>,
) -> Response {
    let (parts, body) = response.into_parts();

    if !is_json(&parts.headers) {
        return Response::from_parts(parts, Body::new(body)).into_response();
    }

    let bytes =
        match axum::body::to_bytes(Body::new(body), state.validator.max_body_bytes()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Failed to buffer upstream response"
                );
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Upstream request failed" })),
                )
                    .into_response();
            }
        };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        // Not JSON after all; forward untouched.
        Err(_) => return Response::from_parts(parts, Body::from(bytes)).into_response(),
    };

    let result = state.scanner.scan(&value);
    if result.is_safe {
        return Response::from_parts(parts, Body::from(bytes)).into_response();
    }

    tracing::warn!(
        request_id = %request_id,
        dangerous_keys = ?result.dangerous_keys,
        dangerous_values = ?result.dangerous_values,
        "Upstream response contained dangerous patterns"
    );
    let envelope = build_safe_response(&state.scanner, true, None, Some(value));
    (parts.status, Json(envelope)).into_response()
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase().contains("application/json"))
        .unwrap_or(false)
}
