//! TCP Game Server
//!
//! Accept loop, fixed-rate tick loop and optional idle sweep. All three
//! stop on one broadcast shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, instrument, warn};

use crate::game::config::WorldConfig;
use crate::game::state::WorldSnapshot;
use crate::game::store::StateStore;
use crate::network::broadcast::broadcast_snapshot;
use crate::network::registry::Registry;
use crate::network::session::{run_session, SessionContext};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 7777;

/// Default cap on one inbound line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Tick rate for game simulation (Hz).
    pub tick_rate: u32,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Outbound queue capacity per session.
    pub outbound_queue: usize,
    /// Drop sessions silent for this long.
    pub idle_timeout: Option<Duration>,
    /// Close sessions that send a longer line. `None` is unbounded.
    pub max_line_len: Option<usize>,
    /// Seed for hazard spawning.
    pub rng_seed: Option<u64>,
    /// World constants.
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            tick_rate: crate::TICK_RATE,
            max_connections: 256,
            outbound_queue: 64,
            idle_timeout: None,
            max_line_len: Some(DEFAULT_MAX_LINE_LEN),
            rng_seed: None,
            world: WorldConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Time budget of one tick.
    pub fn tick_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

/// Game server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    StartupFault {
        /// Requested address
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// The game server, before it starts listening.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The shared world.
    store: Arc<StateStore>,
    /// Live sessions.
    registry: Arc<Registry>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let store = Arc::new(StateStore::new(config.world.clone(), config.rng_seed));
        let registry = Arc::new(Registry::new(store.clone()));

        Self {
            config,
            store,
            registry,
            shutdown_tx,
        }
    }

    /// Bind and spawn the server tasks.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_addr;
        let startup_fault = |source: std::io::Error| ServerError::StartupFault { addr, source };

        let listener = TcpListener::bind(addr).await.map_err(startup_fault)?;
        let local_addr = listener.local_addr().map_err(startup_fault)?;
        info!(
            "Game server listening on {} at {} Hz",
            local_addr, self.config.tick_rate
        );

        let ctx = SessionContext {
            registry: self.registry.clone(),
            outbound_queue: self.config.outbound_queue,
            max_line_len: self.config.max_line_len,
        };

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(run_accept_loop(
            listener,
            ctx,
            self.config.max_connections,
            self.shutdown_tx.clone(),
            self.shutdown_tx.subscribe(),
        )));

        tasks.push(tokio::spawn(run_tick_loop(
            self.store.clone(),
            self.registry.clone(),
            self.config.clone(),
            self.shutdown_tx.subscribe(),
        )));

        if let Some(timeout) = self.config.idle_timeout {
            tasks.push(tokio::spawn(run_idle_sweep(
                self.registry.clone(),
                timeout,
                self.shutdown_tx.subscribe(),
            )));
        }

        Ok(ServerHandle {
            local_addr,
            store: self.store,
            registry: self.registry,
            shutdown_tx: self.shutdown_tx,
            tasks,
        })
    }
}

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    store: Arc<StateStore>,
    registry: Arc<Registry>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.count_active()
    }

    /// Copy of the current world.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.store.snapshot()
    }

    /// The shared world.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Signal every loop to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Server task failed: {}", e);
            }
        }
        info!("Server stopped");
    }
}

/// Accept connections until shutdown, then wait for every session.
///
/// Each session's shutdown receiver is created here, before its task is
/// spawned, so a signal sent before the task first runs is not lost.
async fn run_accept_loop(
    listener: TcpListener,
    ctx: SessionContext,
    max_connections: usize,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        if sessions.len() >= max_connections {
                            warn!("Connection limit reached, rejecting {}", peer);
                            continue;
                        }
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("set_nodelay failed for {}: {}", peer, e);
                        }
                        let session_shutdown = shutdown_tx.subscribe();
                        // A signal sent before that subscribe is only visible here
                        if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                            info!("Shutdown signal received");
                            break;
                        }
                        sessions.spawn(run_session(stream, peer, ctx.clone(), session_shutdown));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    error!("Session task failed: {}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    while sessions.join_next().await.is_some() {}
}

/// Advance the world at a fixed rate and broadcast each snapshot.
async fn run_tick_loop(
    store: Arc<StateStore>,
    registry: Arc<Registry>,
    config: ServerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let budget = config.tick_budget();
    let stats_every = u64::from(config.tick_rate.max(1));
    let mut iterations: u64 = 0;

    loop {
        let started = Instant::now();
        let inputs = registry.latest_inputs();

        let tick_store = store.clone();
        let joined = tokio::task::spawn_blocking(move || tick_store.advance_and_snapshot(&inputs)).await;

        match joined {
            Ok((_result, snapshot)) => {
                if registry.count_active() > 0 {
                    match broadcast_snapshot(&registry, &snapshot) {
                        Ok(report) if report.dropped > 0 || report.failed > 0 => {
                            debug!(
                                delivered = report.delivered,
                                dropped = report.dropped,
                                failed = report.failed,
                                "Broadcast incomplete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("Failed to encode snapshot: {}", e),
                    }
                }

                iterations += 1;
                if iterations % stats_every == 0 {
                    debug!(
                        tick = snapshot.tick,
                        sessions = registry.count_active(),
                        crafts = snapshot.crafts.len(),
                        projectiles = snapshot.projectiles.len(),
                        hazards = snapshot.hazards.len(),
                        cost_us = started.elapsed().as_micros() as u64,
                        "Tick stats"
                    );
                }
            }
            Err(e) => {
                error!("Tick failed: {}", e);
            }
        }

        let remaining = budget.saturating_sub(started.elapsed());
        tokio::select! {
            _ = sleep(remaining) => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    debug!("Tick loop stopped");
}

/// Unregister sessions that have been silent longer than `timeout`.
async fn run_idle_sweep(
    registry: Arc<Registry>,
    timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = interval((timeout / 2).max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for id in registry.idle_sessions(timeout) {
                    if registry.remove(&id) {
                        info!(session = %id.short(), "Removed idle session");
                    }
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::ServerMessage;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.outbound_queue, 64);
        assert!(config.idle_timeout.is_none());
        assert_eq!(config.max_line_len, Some(DEFAULT_MAX_LINE_LEN));
    }

    #[test]
    fn test_tick_budget() {
        let config = ServerConfig { tick_rate: 50, ..Default::default() };
        assert_eq!(config.tick_budget(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let handle = GameServer::new(local_config()).start().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert_eq!(handle.session_count(), 0);
        timeout(Duration::from_secs(2), handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_startup_fault() {
        let first = GameServer::new(local_config()).start().await.unwrap();
        let config = ServerConfig {
            bind_addr: first.local_addr(),
            ..Default::default()
        };
        match GameServer::new(config).start().await {
            Err(ServerError::StartupFault { addr, .. }) => assert_eq!(addr, first.local_addr()),
            Ok(_) => panic!("second bind succeeded"),
        }
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_connection_cap() {
        let config = ServerConfig {
            max_connections: 1,
            ..local_config()
        };
        let handle = GameServer::new(config).start().await.unwrap();

        let first = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut first = BufReader::new(first);
        let mut line = String::new();
        first.read_line(&mut line).await.unwrap();
        assert!(matches!(
            ServerMessage::from_line(line.trim_end()).unwrap(),
            ServerMessage::ClientId(_)
        ));

        let mut second = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut buf = [0u8; 64];
        let n = timeout(Duration::from_secs(2), second.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(handle.session_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_idle_session_removed() {
        let config = ServerConfig {
            idle_timeout: Some(Duration::from_millis(100)),
            ..local_config()
        };
        let handle = GameServer::new(config).start().await.unwrap();

        let stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(handle.session_count(), 1);

        // Connection closes once the sweep drops the session
        let drained = timeout(Duration::from_secs(3), async {
            let mut sink = Vec::new();
            let _ = reader.read_to_end(&mut sink).await;
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(handle.session_count(), 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_line_closes_connection() {
        let config = ServerConfig {
            max_line_len: Some(128),
            ..local_config()
        };
        let handle = GameServer::new(config).start().await.unwrap();

        let stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(handle.session_count(), 1);

        // No newline, so the bytes pile up in the framer
        reader.get_mut().write_all(&[b'x'; 512]).await.unwrap();

        let drained = timeout(Duration::from_secs(2), async {
            let mut sink = Vec::new();
            let _ = reader.read_to_end(&mut sink).await;
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(handle.session_count(), 0);

        handle.shutdown().await;
    }
}
