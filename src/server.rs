// ABOUTME: Binds the listening socket, applies socket options, and drives the accept loop
// ABOUTME: Owns orderly shutdown: publishes close.connection events, then stops accepting within a grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::bus::{Event, EventBus};
use crate::handler::ConnectionHandler;
use crate::protocol::Protocol;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
    #[error("accept loop failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Configuration for [`Server`], matching the `tcp.*` keys in spec.md §6.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Idle timeout; default 10 minutes when unset, per spec.md §4.7.
    pub idle_timeout: Duration,
    pub socket_reuse_port: bool,
    pub socket_fast_open: bool,
    pub socket_defer_accept: bool,
    /// Number of independent accept loops sharing the bound address.
    pub accept_loops: usize,
    /// Caps concurrently-handled connections; the idiomatic stand-in for
    /// the original's worker-pool shard count (see SPEC_FULL.md REDESIGN
    /// FLAGS #2).
    pub workerpool_shards: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: "0.0.0.0:5001".parse().expect("valid default address"),
            idle_timeout: Duration::from_secs(600),
            socket_reuse_port: true,
            socket_fast_open: false,
            socket_defer_accept: false,
            accept_loops: 1,
            workerpool_shards: 256,
        }
    }
}

/// TCP server accepting telematics device connections and driving them
/// through a single [`Protocol`], fanning extracted positions out through an
/// [`EventBus`].
pub struct Server {
    config: ServerConfig,
    protocol: Arc<dyn Protocol>,
    bus: Arc<EventBus>,
}

impl Server {
    pub fn new(config: ServerConfig, protocol: Arc<dyn Protocol>, bus: Arc<EventBus>) -> Self {
        Server { config, protocol, bus }
    }

    /// Binds the configured address, accepts connections until SIGINT, then
    /// performs orderly shutdown: each registered subscriber receives a
    /// `close.connection.<subscriber>` event, and the accept loop stops
    /// within a grace period equal to the idle timeout.
    pub async fn listen_and_serve(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        info!(addr = %self.config.address, proto = self.protocol.name(), "server starts serving");

        let handler = Arc::new(ConnectionHandler::new(
            self.protocol.clone(),
            self.bus.clone(),
            self.config.idle_timeout,
        ));
        let limiter = Arc::new(Semaphore::new(self.config.workerpool_shards.max(1)));

        let mut accept_tasks = JoinSet::new();
        for _ in 0..self.config.accept_loops.max(1) {
            let listener = listener.clone();
            let handler = handler.clone();
            let limiter = limiter.clone();
            accept_tasks.spawn(async move { accept_loop(listener, handler, limiter).await });
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received, shutting down");
            }
        }

        for subscriber in self.bus.subscribers() {
            if subscriber.topics().contains(&crate::bus::TOPIC_CLOSE_CONNECTION) {
                self.bus.publish(Event::close_connection(), self.config.idle_timeout);
            }
        }

        accept_tasks.abort_all();
        let grace = self.config.idle_timeout;
        let _ = tokio::time::timeout(grace, async {
            while accept_tasks.join_next().await.is_some() {}
        })
        .await;

        Ok(())
    }

    fn bind(&self) -> Result<Arc<TcpListener>, ServerError> {
        let domain = if self.config.address.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket =
            Socket::new(domain, Type::STREAM, None).map_err(|source| ServerError::Bind { addr: self.config.address, source })?;

        if self.config.socket_reuse_port {
            if let Err(err) = socket.set_reuse_port(true) {
                warn!(%err, "SO_REUSEPORT not supported on this platform, ignoring");
            }
            let _ = socket.set_reuse_address(true);
        }
        if self.config.socket_fast_open {
            warn!("tcp.socket-fast-open requested but TCP_FASTOPEN is not portable via socket2; ignoring");
        }
        if self.config.socket_defer_accept {
            warn!("tcp.socket-defer-accept requested but TCP_DEFER_ACCEPT is Linux-only and not wired up; ignoring");
        }

        socket
            .bind(&self.config.address.into())
            .map_err(|source| ServerError::Bind { addr: self.config.address, source })?;
        socket
            .listen(1024)
            .map_err(|source| ServerError::Bind { addr: self.config.address, source })?;
        socket.set_nonblocking(true).map_err(|source| ServerError::Bind { addr: self.config.address, source })?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener =
            TcpListener::from_std(std_listener).map_err(|source| ServerError::Bind { addr: self.config.address, source })?;
        Ok(Arc::new(listener))
    }
}

async fn accept_loop(listener: Arc<TcpListener>, handler: Arc<ConnectionHandler>, limiter: Arc<Semaphore>) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!(%err, "accept error");
                continue;
            }
        };

        let permit = match limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let handler = handler.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handler.handle(stream, remote.to_string()).await;
        });
    }
}
