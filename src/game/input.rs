//! Player Input
//!
//! Control flags as sent on the wire, and the per-tick batch the
//! scheduler hands to the simulation.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::id::SessionId;
use crate::core::vec2::Vec2;

/// Raw control flags from one INPUT message.
///
/// Missing fields decode as `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlState {
    /// Move left
    pub left: bool,
    /// Move right
    pub right: bool,
    /// Move up (toward the top edge)
    pub up: bool,
    /// Move down
    pub down: bool,
    /// Fire (edge-triggered by the simulation)
    pub fire: bool,
    /// Request a reset (only honoured after game over)
    pub reset: bool,
}

impl ControlState {
    /// Unnormalized direction from the held flags.
    ///
    /// Opposite flags cancel out.
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.left {
            dir += Vec2::LEFT;
        }
        if self.right {
            dir += Vec2::RIGHT;
        }
        if self.up {
            dir += Vec2::UP;
        }
        if self.down {
            dir += Vec2::DOWN;
        }
        dir
    }
}

/// Control flags stamped with the session that sent them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputCommand {
    /// Session that sent the input
    pub origin: SessionId,
    /// Flags
    pub controls: ControlState,
}

impl InputCommand {
    /// Stamp controls with their origin.
    pub fn new(origin: SessionId, controls: ControlState) -> Self {
        Self { origin, controls }
    }
}

/// Latest input per owner for one tick (BTreeMap for stable order).
pub type InputBatch = BTreeMap<SessionId, ControlState>;
