//! Connection Registry
//!
//! The set of live sessions. The tick loop reads it for inputs and
//! broadcast targets; session handlers add and remove themselves.
//! Removal releases the registry lock before notifying anyone, so the
//! registry lock and the world lock are never held together.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error};

use crate::core::id::SessionId;
use crate::game::input::{ControlState, InputBatch, InputCommand};
use crate::network::protocol::ServerMessage;

/// Notified as sessions join and leave the registry.
pub trait SessionListener: Send + Sync {
    /// Called once per added session, outside the registry lock.
    fn session_added(&self, _id: &SessionId) {}

    /// Called once per removed session, outside the registry lock.
    fn session_removed(&self, id: &SessionId);
}

// =============================================================================
// SESSION
// =============================================================================

/// One connected client as seen by the rest of the server.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    /// Encoded lines waiting for the writer task
    outbound: mpsc::Sender<Arc<str>>,
    /// Latest input, last writer wins
    input: watch::Sender<Option<InputCommand>>,
    /// Registry-initiated close
    close: Notify,
    closed: AtomicBool,
    created_at: Instant,
    /// Milliseconds since `created_at`
    last_activity: AtomicU64,
}

impl Session {
    /// Create a session around its outbound queue.
    pub fn new(id: SessionId, peer: SocketAddr, outbound: mpsc::Sender<Arc<str>>) -> Self {
        let (input, _) = watch::channel(None);
        Self {
            id,
            peer,
            outbound,
            input,
            close: Notify::new(),
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
            last_activity: AtomicU64::new(0),
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Replace the latest input.
    pub fn set_input(&self, controls: ControlState) {
        self.input.send_replace(Some(InputCommand::new(self.id.clone(), controls)));
    }

    /// Latest input, if the client has sent any.
    pub fn latest_input(&self) -> Option<InputCommand> {
        self.input.borrow().clone()
    }

    /// Queue an already-encoded line without waiting.
    pub fn enqueue(&self, line: Arc<str>) -> Result<(), TrySendError<Arc<str>>> {
        self.outbound.try_send(line)
    }

    /// Encode and queue a message. Returns false if it was not queued.
    pub fn send(&self, message: &ServerMessage) -> bool {
        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!(session = %self.id.short(), "Failed to serialize message: {}", e);
                return false;
            }
        };
        match self.enqueue(Arc::from(line)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(session = %self.id.short(), "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the session's handler to stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Stores a permit if the handler is not waiting yet
        self.close.notify_one();
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.close.notified().await;
    }

    /// Record activity now.
    pub fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        self.last_activity.store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Thread-safe map of live sessions.
pub struct Registry {
    sessions: RwLock<BTreeMap<SessionId, Arc<Session>>>,
    listener: Arc<dyn SessionListener>,
}

impl Registry {
    /// Create an empty registry reporting removals to `listener`.
    pub fn new(listener: Arc<dyn SessionListener>) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            listener,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session.
    pub fn add(&self, session: Arc<Session>) {
        let id = session.id().clone();
        self.write().insert(id.clone(), session);
        self.listener.session_added(&id);
    }

    /// Unregister a session. Idempotent.
    ///
    /// Returns true if the session was present.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.write().remove(id);

        match removed {
            Some(session) => {
                session.close();
                self.listener.session_removed(id);
                debug!(session = %id.short(), "Session unregistered");
                true
            }
            None => false,
        }
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.read().get(id).cloned()
    }

    /// All live sessions in id order.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.read().values().cloned().collect()
    }

    /// Number of live sessions.
    pub fn count_active(&self) -> usize {
        self.read().len()
    }

    /// Latest input of every session that has sent one.
    pub fn latest_inputs(&self) -> InputBatch {
        self.read()
            .values()
            .filter_map(|s| s.latest_input())
            .map(|cmd| (cmd.origin, cmd.controls))
            .collect()
    }

    /// Sessions with no activity for longer than `timeout`.
    pub fn idle_sessions(&self, timeout: Duration) -> Vec<SessionId> {
        self.read()
            .values()
            .filter(|s| s.idle_for() > timeout)
            .map(|s| s.id().clone())
            .collect()
    }
}
