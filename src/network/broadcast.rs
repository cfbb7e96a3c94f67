//! Snapshot Broadcast
//!
//! Encodes a snapshot once and offers it to every session's outbound
//! queue without waiting. A closed queue means that session's writer is
//! gone, so the session is unregistered. A full queue only costs that
//! client one frame.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::game::state::WorldSnapshot;
use crate::network::protocol::ServerMessage;
use crate::network::registry::{Registry, Session};

/// Per-broadcast delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Frames queued
    pub delivered: usize,
    /// Frames dropped on full queues
    pub dropped: usize,
    /// Sessions unregistered because their queue was closed
    pub failed: usize,
}

/// Encode one GAME_STATE line.
pub fn encode_snapshot(snapshot: &WorldSnapshot) -> Result<Arc<str>, serde_json::Error> {
    Ok(Arc::from(ServerMessage::GameState(snapshot.clone()).to_line()?))
}

/// Offer an encoded line to each session.
pub fn broadcast_line(registry: &Registry, sessions: &[Arc<Session>], line: &Arc<str>) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for session in sessions {
        match session.enqueue(line.clone()) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) => {
                debug!(session = %session.id().short(), "Outbound queue full, frame dropped");
                report.dropped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                registry.remove(session.id());
                report.failed += 1;
            }
        }
    }

    report
}

/// Encode a snapshot and offer it to every registered session.
pub fn broadcast_snapshot(
    registry: &Registry,
    snapshot: &WorldSnapshot,
) -> Result<BroadcastReport, serde_json::Error> {
    let line = encode_snapshot(snapshot)?;
    let sessions = registry.snapshot();
    Ok(broadcast_line(registry, &sessions, &line))
}
