//! ProxyServer struct, lifecycle, and listener loop.
//!
//! The listener runs as a supervised detached task so its event loop never
//! blocks the controlling caller; `start` returns once the task is
//! launched, not once the listener is confirmed accepting connections, and
//! `stop` aborts the task and waits for it to finish. Callers needing a
//! readiness guarantee must probe the listener themselves.

use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::handler::{handle_request, ServerState};
use super::policy::{HeaderPolicy, HeaderRule};
use super::routes::{RouteGuard, RouteTable};
use crate::config::ListenAddr;
use crate::error::{Error, Result};

/// The relay's forwarding HTTP server.
///
/// Single-owner: the controlling caller holds the only handle and must not
/// start a server that is already running.
pub struct ProxyServer {
    addr: ListenAddr,
    routes: RouteTable,
    policy: Arc<RwLock<HeaderPolicy>>,
    worker: Option<JoinHandle<()>>,
}

impl ProxyServer {
    /// Create a server with an empty header policy.
    pub fn new(addr: ListenAddr) -> Self {
        Self::with_policy(addr, HeaderPolicy::new())
    }

    pub fn with_policy(addr: ListenAddr, policy: HeaderPolicy) -> Self {
        Self {
            addr,
            routes: RouteTable::with_registered_routes(),
            policy: Arc::new(RwLock::new(policy)),
            worker: None,
        }
    }

    pub fn addr(&self) -> &ListenAddr {
        &self.addr
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Register a header rule. Allowed in any state; takes effect on the
    /// next handled request.
    pub fn add_header_rule(&self, name: impl Into<String>, rule: HeaderRule) {
        self.policy.write().insert(name, rule);
    }

    /// Merge a batch of header rules into the policy.
    pub fn extract_header_rules<I>(&self, rules: I)
    where
        I: IntoIterator<Item = (String, HeaderRule)>,
    {
        self.policy.write().extend(rules);
    }

    pub fn has_header_rule(&self, name: &str) -> bool {
        self.policy.read().contains(name)
    }

    /// Launch the listener as a detached task.
    ///
    /// Snapshots the registered routes into the route guard first, so the
    /// guard only ever accepts handlers bound at start time. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self) {
        let guard = RouteGuard::snapshot(&self.routes);
        let state = Arc::new(ServerState {
            policy: Arc::clone(&self.policy),
            guard,
        });
        let addr = self.addr.clone();
        self.worker = Some(tokio::spawn(run_listener(addr, state)));
    }

    /// Terminate the listener task and wait for it to exit.
    ///
    /// In-flight forwarded requests are abandoned. Stopping a server that
    /// is not running is an error.
    pub async fn stop(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(Error::ServerNotAlive)?;
        worker.abort();
        // A JoinError here is the expected cancellation.
        let _ = worker.await;
        info!(
            "Server at http://{}:{} has been stopped.",
            self.addr.host, self.addr.port
        );
        Ok(())
    }
}

async fn run_listener(addr: ListenAddr, state: Arc<ServerState>) {
    let listener = match TcpListener::bind((addr.host.as_str(), addr.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind relay listener on {}:{}: {}", addr.host, addr.port, e);
            return;
        }
    };

    info!("Relay listening on http://{}:{}", addr.host, addr.port);

    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { handle_request(&state, req).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving connection from {}: {}", remote_addr, err);
            }
        });
    }
}
