//! HTTP transport (component C7): owns the event store, client registry,
//! rate limiter, and metrics registry; exposes four endpoints behind a fixed
//! middleware chain; serves over TCP or a Unix domain socket, optionally
//! with TLS.

pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::message::Message;
use crate::metrics::MetricsRegistry;
use crate::rate_limit::RateLimiter;
use crate::sse::{ClientRegistry, SseEvent};
use crate::transport::RequestHandler;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid bind address \"{0}\"")]
    InvalidAddress(String),
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("transport is closed")]
    Closed,
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// State shared across every axum handler and middleware layer.
pub struct AppState {
    pub config: Config,
    pub registry: ClientRegistry,
    pub metrics: MetricsRegistry,
    pub rate_limiter: Option<RateLimiter>,
    pub handler: Option<Arc<dyn RequestHandler>>,
    pub shutdown: CancellationToken,
    next_event_id: AtomicU64,
}

impl AppState {
    pub fn next_event_id(&self) -> String {
        (self.next_event_id.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

/// Parses a bind address like `":8080"` or `"8080"` into a full `host:port`
/// form suitable for [`TcpListener::bind`].
fn normalize_address(input: &str) -> Result<String, HttpError> {
    let addr = if let Some(port) = input.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };

    addr.parse::<SocketAddr>().map_err(|_| HttpError::InvalidAddress(input.to_string()))?;
    Ok(addr)
}

pub struct HttpTransport {
    state: Arc<AppState>,
    closed: AtomicBool,
}

impl HttpTransport {
    pub fn new(config: Config, handler: Option<Arc<dyn RequestHandler>>) -> Self {
        let rate_limiter = config.rate_limit_enabled().then(|| RateLimiter::new(config.rate_limit));

        let state = Arc::new(AppState {
            registry: ClientRegistry::new(),
            metrics: MetricsRegistry::new(),
            rate_limiter,
            handler,
            shutdown: CancellationToken::new(),
            next_event_id: AtomicU64::new(0),
            config,
        });

        Self { state, closed: AtomicBool::new(false) }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Broadcast the envelope to every connected SSE client. Fails if the
    /// transport has been closed. `ReadMessage` has no HTTP equivalent: the
    /// transport is callback-driven via [`HttpTransport::serve`], not
    /// pull-driven.
    pub fn write_message(&self, message: &Message) -> Result<(), HttpError> {
        if self.is_closed() {
            return Err(HttpError::Closed);
        }

        let event_id = self.state.next_event_id();
        let encoded = serde_json::to_string(message)?;
        self.state.registry.broadcast(SseEvent::new(event_id, "message", encoded));
        self.state.metrics.record_sse_event();
        Ok(())
    }

    /// Idempotent. Signals the shutdown broadcast; unlinks the Unix socket
    /// file if one was configured.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.shutdown.cancel();
        if let Some(path) = self.state.config.socket_path.as_deref() {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Builds the axum [`Router`](axum::Router) for this transport without
    /// binding a listener. Exposed so tests can drive requests through the
    /// full middleware chain with `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> axum::Router {
        handlers::build_router(self.state.clone())
    }

    /// Binds the configured listener (TCP or Unix socket, with optional
    /// TLS) and serves until `close()` is called, with a bounded graceful
    /// shutdown.
    pub async fn serve(&self) -> Result<(), HttpError> {
        let app = self.router();
        let shutdown = self.state.shutdown.clone();

        if let Some(socket_path) = self.state.config.socket_path.clone() {
            return self.serve_unix(&socket_path, app, shutdown).await;
        }

        if self.state.config.tls_enabled() {
            return self.serve_tls(app, shutdown).await;
        }

        let addr = normalize_address(&self.state.config.address)?;
        let listener = TcpListener::bind(&addr).await.map_err(HttpError::Bind)?;
        tracing::info!(address = %addr, "HTTP transport listening");

        let signal = shutdown.clone();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move { signal.cancelled().await });
        run_bounded(server, shutdown).await
    }

    #[cfg(unix)]
    async fn serve_unix(&self, socket_path: &str, app: axum::Router, shutdown: CancellationToken) -> Result<(), HttpError> {
        let _ = std::fs::remove_file(socket_path);
        let listener = tokio::net::UnixListener::bind(socket_path).map_err(HttpError::Bind)?;
        tracing::info!(socket_path, "HTTP transport listening on unix socket");

        let signal = shutdown.clone();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move { signal.cancelled().await });
        let result = run_bounded(server, shutdown).await;

        let _ = std::fs::remove_file(socket_path);
        result
    }

    #[cfg(not(unix))]
    async fn serve_unix(&self, _socket_path: &str, _app: axum::Router, _shutdown: CancellationToken) -> Result<(), HttpError> {
        Err(HttpError::Bind(std::io::Error::new(std::io::ErrorKind::Unsupported, "unix sockets are not supported on this platform")))
    }

    async fn serve_tls(&self, app: axum::Router, shutdown: CancellationToken) -> Result<(), HttpError> {
        let cert = self.state.config.tls_cert_file.as_deref().expect("tls_enabled implies cert is set");
        let key = self.state.config.tls_key_file.as_deref().expect("tls_enabled implies key is set");

        if !Path::new(cert).exists() {
            return Err(HttpError::Tls(format!("certificate file not found: {cert}")));
        }
        if !Path::new(key).exists() {
            return Err(HttpError::Tls(format!("key file not found: {key}")));
        }

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|err| HttpError::Tls(err.to_string()))?;

        let addr = normalize_address(&self.state.config.address)?;
        let socket_addr: SocketAddr = addr.parse().map_err(|_| HttpError::InvalidAddress(addr.clone()))?;
        tracing::info!(address = %addr, "HTTP transport listening (TLS)");

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_TIMEOUT));
        });

        axum_server::bind_rustls(socket_addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(HttpError::Serve)
    }
}

/// Runs a `with_graceful_shutdown`-wrapped server to completion, but never
/// waits more than [`SHUTDOWN_TIMEOUT`] past the shutdown signal for
/// in-flight connections (notably long-lived SSE streams) to drain.
async fn run_bounded<F>(server: F, shutdown: CancellationToken) -> Result<(), HttpError>
where
    F: std::future::Future<Output = std::io::Result<()>> + Send + 'static,
{
    let task = tokio::spawn(server);
    shutdown.cancelled().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(err))) => Err(HttpError::Serve(err)),
        Ok(Err(_join_err)) => Ok(()),
        Err(_elapsed) => {
            tracing::warn!("HTTP transport did not shut down within the grace period");
            Ok(())
        }
    }
}
