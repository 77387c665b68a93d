//! # Health Check Server
//!
//! Embedded HTTP endpoint for the monitor process:
//! - `/health` - liveness, uptime and feed connection state
//! - `/metrics` - JSON snapshot of pipeline counters
//!
//! The server knows nothing about the pipeline itself; it asks a [`HealthReporter`]
//! on every request.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use health_check::{HealthCheckServer, HealthReporter};
//! use std::sync::Arc;
//!
//! struct Static;
//!
//! impl HealthReporter for Static {
//!     fn connection_state(&self) -> String {
//!         "connected".to_string()
//!     }
//!     fn metrics(&self) -> serde_json::Value {
//!         serde_json::json!({ "candles_received": 0 })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let server = HealthCheckServer::new("ema_monitor", 8080, Arc::new(Static));
//! server.serve(std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Source of the live values the endpoints report
pub trait HealthReporter: Send + Sync + 'static {
    /// Current feed connection state, e.g. `"connected"`
    fn connection_state(&self) -> String;

    /// Counter snapshot served on `/metrics`
    fn metrics(&self) -> serde_json::Value;
}

struct ServiceContext {
    service_name: String,
    started: Instant,
    reporter: Arc<dyn HealthReporter>,
}

/// HTTP health check server
pub struct HealthCheckServer {
    context: Arc<ServiceContext>,
    port: u16,
}

impl HealthCheckServer {
    pub fn new(service_name: &str, port: u16, reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            context: Arc::new(ServiceContext {
                service_name: service_name.to_string(),
                started: Instant::now(),
                reporter,
            }),
            port,
        }
    }

    /// Serve on all interfaces until `shutdown` completes
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let context = Arc::clone(&self.context);

        let make_svc = make_service_fn(move |_conn| {
            let context = Arc::clone(&context);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let context = Arc::clone(&context);
                    async move { Ok::<_, Infallible>(route(&req, &context)) }
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("Failed to bind health check server on {}", addr))?
            .serve(make_svc);

        info!("Health check server listening on http://{}", addr);
        info!("Endpoints: /health, /metrics");

        server
            .with_graceful_shutdown(shutdown)
            .await
            .context("Health check server error")?;

        info!("Health check server stopped");
        Ok(())
    }

    /// Answer one request without going through a socket
    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        route(req, &self.context)
    }
}

fn route(req: &Request<Body>, context: &ServiceContext) -> Response<Body> {
    let path = req.uri().path();
    let method = req.method();

    debug!("Health check request: {} {}", method, path);

    let known = matches!(path, "/health" | "/metrics");
    if !known {
        return json_response(
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "not found" }),
        );
    }

    if method != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            serde_json::json!({ "error": "method not allowed" }),
        );
    }

    match path {
        "/health" => json_response(
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "service": context.service_name,
                "uptime_seconds": context.started.elapsed().as_secs(),
                "connection": context.reporter.connection_state(),
            }),
        ),
        _ => json_response(StatusCode::OK, context.reporter.metrics()),
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
