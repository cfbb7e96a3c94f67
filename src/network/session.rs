//! Client Session Handler
//!
//! One task per accepted connection. Reads newline-framed envelopes,
//! keeps the session's latest input current and answers PINGs. A
//! separate writer task drains the outbound queue to the socket.
//!
//! Every exit path funnels into a single unregister.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::core::id::SessionId;
use crate::network::framing::{FramingError, LineFramer};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::registry::{Registry, Session};

/// Read buffer size per connection.
const READ_BUFFER_SIZE: usize = 4096;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Socket read or write failed.
    #[error("Connection fault: {0}")]
    ConnectionFault(#[from] std::io::Error),
}

impl From<FramingError> for SessionError {
    fn from(err: FramingError) -> Self {
        SessionError::ConnectionFault(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

/// Why a session ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed its side.
    PeerClosed,
    /// The writer task stopped.
    WriterStopped,
    /// Registry asked the session to close.
    Closed,
    /// Server is shutting down.
    Shutdown,
}

impl SessionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::PeerClosed => "peer closed",
            SessionEnd::WriterStopped => "writer stopped",
            SessionEnd::Closed => "closed by server",
            SessionEnd::Shutdown => "server shutdown",
        }
    }
}

/// Shared handles every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Live sessions
    pub registry: Arc<Registry>,
    /// Outbound queue capacity
    pub outbound_queue: usize,
    /// Longest accepted inbound line
    pub max_line_len: Option<usize>,
}

/// Drive one connection until it ends, then unregister it.
///
/// `shutdown_rx` must be subscribed before the task is spawned.
/// Returns the session id that was assigned.
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    ctx: SessionContext,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> SessionId
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let id = SessionId::generate();
    let (outbound_tx, outbound_rx) = mpsc::channel(ctx.outbound_queue.max(1));
    let session = Arc::new(Session::new(id.clone(), peer, outbound_tx));

    // First line on the wire, queued before anyone can broadcast to us
    session.send(&ServerMessage::ClientId(id.clone()));
    ctx.registry.add(session.clone());
    info!(session = %id.short(), %peer, "Client connected");

    let (reader, writer) = tokio::io::split(stream);
    let mut writer_task = tokio::spawn(write_loop(writer, outbound_rx));

    let framer = match ctx.max_line_len {
        Some(limit) => LineFramer::with_limit(limit),
        None => LineFramer::new(),
    };
    let outcome = read_loop(reader, framer, &session, &mut writer_task, &mut shutdown_rx).await;

    writer_task.abort();
    ctx.registry.remove(&id);

    match outcome {
        Ok(end) => info!(session = %id.short(), %peer, reason = end.as_str(), "Client disconnected"),
        Err(e) => warn!(session = %id.short(), %peer, error = %e, "Client disconnected on fault"),
    }

    id
}

#[instrument(skip_all, fields(session = %session.id().short()))]
async fn read_loop<R>(
    mut reader: R,
    mut framer: LineFramer,
    session: &Session,
    writer_task: &mut JoinHandle<Result<(), SessionError>>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    if framer.pending() > 0 {
                        debug!(pending = framer.pending(), "Discarding partial line");
                    }
                    return Ok(SessionEnd::PeerClosed);
                }
                session.touch();
                for line in framer.push(&buf[..n])? {
                    handle_line(session, &line);
                }
            }
            joined = &mut *writer_task => {
                return match joined {
                    Ok(Err(e)) => Err(e),
                    _ => Ok(SessionEnd::WriterStopped),
                };
            }
            _ = session.closed() => {
                return Ok(SessionEnd::Closed);
            }
            _ = shutdown_rx.recv() => {
                return Ok(SessionEnd::Shutdown);
            }
        }
    }
}

fn handle_line(session: &Session, line: &[u8]) {
    match ClientMessage::from_bytes(line) {
        Ok(ClientMessage::Input(controls)) => session.set_input(controls),
        Ok(ClientMessage::Ping) => {
            session.send(&ServerMessage::Pong);
        }
        Err(e) => warn!(session = %session.id().short(), "Dropping line: {}", e),
    }
}

/// Drain the outbound queue to the socket until it closes or a write fails.
async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Arc<str>>) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}
