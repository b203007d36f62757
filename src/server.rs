use std::{
    future::Future,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    access_log::{self, AccessLogger},
    config,
    report,
    types::{AccessRecord, PortBinding},
};

/// Settings for the server binary, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub config: PathBuf,
    pub access_log: PathBuf,
    pub report: PathBuf,
    pub host: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config: PathBuf::from("servers.csv"),
            access_log: PathBuf::from(access_log::DEFAULT_ACCESS_LOG),
            report: PathBuf::from(report::DEFAULT_REPORT),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

#[derive(Clone)]
pub struct PortState {
    inner: Arc<PortContext>, // immutable per-port settings shared by every request
}

#[derive(Debug)]
struct PortContext {
    text: String,
    server_port: u16,
    logger: AccessLogger,
}

impl PortState {
    pub fn new(text: impl Into<String>, server_port: u16, logger: AccessLogger) -> Self {
        Self {
            inner: Arc::new(PortContext {
                text: text.into(),
                server_port,
                logger,
            }),
        }
    }
}

/// Router for one port: every path and method answers 200 with the configured text.
pub fn router(state: PortState) -> Router {
    Router::new()
        .fallback(serve_text)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_text(
    State(state): State<PortState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let ctx = &state.inner;
    let record = AccessRecord {
        timestamp: access_log::now_timestamp(),
        client_address: peer.ip().to_string(),
        client_port: peer.port(),
        server_port: ctx.server_port,
    };
    if let Err(e) = ctx.logger.append(&record).await {
        warn!(port = ctx.server_port, client = %peer, "access log write failed: {e:#}");
    }
    (StatusCode::OK, ctx.text.clone())
}

struct BoundPort {
    binding: PortBinding,
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// Every configured port, bound and ready to serve.
pub struct ListenerSet {
    ports: Vec<BoundPort>,
    logger: AccessLogger,
}

impl ListenerSet {
    /// Bind all ports before serving any of them. Failing to bind one port fails the whole set.
    pub async fn bind(bindings: &[PortBinding], host: IpAddr, logger: AccessLogger) -> Result<Self> {
        let mut ports = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let listener = TcpListener::bind(SocketAddr::new(host, binding.port))
                .await
                .with_context(|| format!("failed to start server on port {}", binding.port))?;
            let local_addr = listener.local_addr()?;
            ports.push(BoundPort {
                binding: binding.clone(),
                listener,
                local_addr,
            });
        }
        Ok(Self { ports, logger })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.ports.iter().map(|p| p.local_addr).collect()
    }

    /// Serve every port until `shutdown` fires. If any listener fails, the others are shut
    /// down and the error is returned.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut set = JoinSet::new();

        for port in self.ports {
            let server_port = port.local_addr.port();
            let state = PortState::new(port.binding.text, server_port, self.logger.clone());
            let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
            let stop = shutdown.clone();

            info!("Starting server on port {}", server_port);
            set.spawn(async move {
                axum::serve(port.listener, app)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
                    .with_context(|| format!("server on port {server_port} failed"))
            });
        }

        while let Some(joined) = set.join_next().await {
            let outcome = joined.context("listener task panicked").and_then(|r| r);
            if let Err(e) = outcome {
                shutdown.cancel();
                return Err(e);
            }
        }
        Ok(())
    }
}

/// `--start`: load the port bindings, bind every port, and serve until Ctrl+C.
pub async fn run_server(cfg: ServerConfig) -> Result<()> {
    let bindings = config::load_bindings_from_path(&cfg.config)
        .context("configuration file validation failed")?;
    let logger = AccessLogger::new(&cfg.access_log);
    let set = ListenerSet::bind(&bindings, cfg.host, logger).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    set.run(shutdown).await
}

/// Cancel `shutdown` once `signal` is delivered. If the handler could not be installed the
/// listeners keep running until the process is killed.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Ctrl+C received, shutting down");
            shutdown.cancel();
        }
        Err(e) => {
            warn!("cannot listen for Ctrl+C, serving until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}

/// `--report`: summarise the access log into the report file.
pub fn run_report(cfg: &ServerConfig) -> Result<usize> {
    let rows = report::generate_report(&cfg.access_log, &cfg.report)?;
    println!("Report saved to {}", cfg.report.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn mock_peer() -> SocketAddr {
        SocketAddr::from(([10, 1, 2, 3], 40000))
    }

    #[tokio::test]
    async fn any_path_and_method_gets_configured_text() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AccessLogger::new(dir.path().join("access_log.csv"));
        let app = router(PortState::new("Hello from port 8080", 8080, logger))
            .layer(MockConnectInfo(mock_peer()));

        for (method, uri) in [(Method::GET, "/"), (Method::POST, "/some/where")] {
            let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"Hello from port 8080");
        }

        let records = access_log::read_log(dir.path().join("access_log.csv")).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.client_address == "10.1.2.3"
            && r.client_port == 40000
            && r.server_port == 8080));
    }

    #[tokio::test]
    async fn delivered_signal_cancels_listeners() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn missing_signal_handler_keeps_serving() {
        let shutdown = CancellationToken::new();
        let waiter = tokio::spawn(cancel_on_signal(
            async { Err(io::Error::new(io::ErrorKind::Other, "no handler")) },
            shutdown.clone(),
        ));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!shutdown.is_cancelled());
        assert!(!waiter.is_finished());
        waiter.abort();
    }

    #[tokio::test]
    async fn log_failure_still_serves() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for append
        let logger = AccessLogger::new(dir.path());
        let app = router(PortState::new("still here", 9000, logger))
            .layer(MockConnectInfo(mock_peer()));

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"still here");
    }
}
