//! World State Definitions
//!
//! All entity types for the shared simulation.
//! Uses BTreeMap for stable craft iteration order.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::id::SessionId;
use crate::core::vec2::Vec2;
use crate::game::config::WorldConfig;

// =============================================================================
// ENTITIES
// =============================================================================

/// A player-controlled ship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Craft {
    /// Owning session
    pub owner: SessionId,

    /// Current position (center)
    pub position: Vec2,

    /// Is the craft still flying?
    pub alive: bool,

    /// Fire was held on the previous input; shots fire on the rising edge only
    #[serde(skip)]
    pub fire_held: bool,
}

impl Craft {
    /// Create a live craft.
    pub fn new(owner: SessionId, position: Vec2) -> Self {
        Self {
            owner,
            position,
            alive: true,
            fire_held: false,
        }
    }
}

/// A shot travelling up the screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Current position
    pub position: Vec2,
    /// Displacement per tick
    pub velocity: Vec2,
}

impl Projectile {
    /// Create a projectile.
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }
}

/// A falling obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    /// Current position (center)
    pub position: Vec2,
    /// Displacement per tick
    pub velocity: Vec2,
    /// Collision radius
    pub radius: f32,
}

impl Hazard {
    /// Create a hazard.
    pub fn new(position: Vec2, velocity: Vec2, radius: f32) -> Self {
        Self { position, velocity, radius }
    }

    /// Create a hazard that does not move.
    pub fn stationary(position: Vec2, radius: f32) -> Self {
        Self::new(position, Vec2::ZERO, radius)
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// The single shared world.
///
/// Only the state store holds one of these; everybody else sees
/// [`WorldSnapshot`] copies.
#[derive(Clone, Debug, Default)]
pub struct World {
    /// Crafts by owner
    pub crafts: BTreeMap<SessionId, Craft>,
    /// Live projectiles
    pub projectiles: Vec<Projectile>,
    /// Live hazards
    pub hazards: Vec<Hazard>,
    /// Team score
    pub score: u64,
    /// All crafts are down
    pub game_over: bool,
    /// Ticks since start or last reset
    pub tick: u64,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a craft by owner.
    pub fn craft(&self, owner: &SessionId) -> Option<&Craft> {
        self.crafts.get(owner)
    }

    /// Number of crafts still flying.
    pub fn alive_craft_count(&self) -> usize {
        self.crafts.values().filter(|c| c.alive).count()
    }

    /// Whether the game-over condition holds right now.
    pub fn all_crafts_down(&self) -> bool {
        !self.crafts.is_empty() && self.crafts.values().all(|c| !c.alive)
    }

    /// Recompute the game-over flag from the crafts.
    ///
    /// Returns true if the flag changed.
    pub fn refresh_game_over(&mut self) -> bool {
        let down = self.all_crafts_down();
        let changed = down != self.game_over;
        self.game_over = down;
        changed
    }

    /// Add a craft for a new owner at the next lane.
    pub fn spawn_craft(&mut self, owner: SessionId, config: &WorldConfig, alive: bool) {
        let count = self.crafts.len();
        let mut craft = Craft::new(owner.clone(), config.lane_position(count, count));
        craft.alive = alive;
        self.crafts.insert(owner, craft);
    }

    /// Remove an owner's craft and keep the game-over flag consistent.
    ///
    /// Returns true if a craft was removed.
    pub fn remove_craft(&mut self, owner: &SessionId) -> bool {
        if self.crafts.remove(owner).is_some() {
            self.refresh_game_over();
            true
        } else {
            false
        }
    }

    /// Clear the round and put every known owner back in a fresh lane.
    pub fn reset(&mut self, config: &WorldConfig) {
        self.projectiles.clear();
        self.hazards.clear();
        self.score = 0;
        self.tick = 0;
        self.game_over = false;

        let count = self.crafts.len();
        for (index, craft) in self.crafts.values_mut().enumerate() {
            craft.position = config.lane_position(index, count);
            craft.alive = true;
            craft.fire_held = false;
        }
    }

    /// Read-consistent copy for broadcast.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            crafts: self.crafts.clone(),
            projectiles: self.projectiles.clone(),
            hazards: self.hazards.clone(),
            score: self.score,
            game_over: self.game_over,
            tick: self.tick,
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Immutable copy of the world at one tick; the GAME_STATE payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Crafts by owner
    pub crafts: BTreeMap<SessionId, Craft>,
    /// Live projectiles
    pub projectiles: Vec<Projectile>,
    /// Live hazards
    pub hazards: Vec<Hazard>,
    /// Team score
    pub score: u64,
    /// All crafts are down
    pub game_over: bool,
    /// Tick counter
    pub tick: u64,
}
