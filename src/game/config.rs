//! Simulation Configuration
//!
//! Every tunable constant of the world lives here. `Default` carries the
//! canonical values the clients are built against.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// Play area width.
pub const ARENA_WIDTH: f32 = 800.0;

/// Play area height.
pub const ARENA_HEIGHT: f32 = 600.0;

/// Craft movement per tick at full input.
pub const SHIP_SPEED: f32 = 5.0;

/// Half the craft's extent; keeps the hull inside the arena when clamped.
pub const SHIP_HALF_EXTENT: f32 = 20.0;

/// Distance of the craft row above the bottom edge.
pub const SHIP_ROW_OFFSET: f32 = 60.0;

/// Projectile movement per tick (upward).
pub const PROJECTILE_SPEED: f32 = 10.0;

/// Spawn offset of a projectile above its craft.
pub const PROJECTILE_OFFSET: f32 = 25.0;

/// Projectiles are dropped once this far above the top edge.
pub const PROJECTILE_EXIT_MARGIN: f32 = 10.0;

/// Hazard radius.
pub const HAZARD_RADIUS: f32 = 20.0;

/// Slowest hazard fall speed per tick.
pub const HAZARD_MIN_SPEED: f32 = 1.0;

/// Fastest hazard fall speed per tick (exclusive).
pub const HAZARD_MAX_SPEED: f32 = 4.0;

/// Hazards are dropped once this far below the bottom edge.
pub const HAZARD_EXIT_MARGIN: f32 = 50.0;

/// Ticks between hazard spawns.
pub const HAZARD_SPAWN_INTERVAL: u64 = 60;

/// Extra reach added to a hazard radius when testing against crafts.
pub const CRAFT_HIT_MARGIN: f32 = 10.0;

/// Score per destroyed hazard.
pub const SCORE_PER_HIT: u64 = 10;

/// Configuration for the world simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Play area width
    pub width: f32,
    /// Play area height
    pub height: f32,
    /// Craft speed per tick
    pub ship_speed: f32,
    /// Craft half extent used for clamping
    pub ship_half_extent: f32,
    /// Craft row offset from the bottom edge
    pub ship_row_offset: f32,
    /// Projectile speed per tick
    pub projectile_speed: f32,
    /// Projectile spawn offset above the craft
    pub projectile_offset: f32,
    /// Removal margin above the top edge
    pub projectile_exit_margin: f32,
    /// Hazard radius for spawned hazards
    pub hazard_radius: f32,
    /// Minimum hazard fall speed
    pub hazard_min_speed: f32,
    /// Maximum hazard fall speed (exclusive)
    pub hazard_max_speed: f32,
    /// Removal margin below the bottom edge
    pub hazard_exit_margin: f32,
    /// Ticks between spawns (0 disables spawning)
    pub hazard_spawn_interval: u64,
    /// Extra reach when testing hazards against crafts
    pub craft_hit_margin: f32,
    /// Score awarded per hit
    pub score_per_hit: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            ship_speed: SHIP_SPEED,
            ship_half_extent: SHIP_HALF_EXTENT,
            ship_row_offset: SHIP_ROW_OFFSET,
            projectile_speed: PROJECTILE_SPEED,
            projectile_offset: PROJECTILE_OFFSET,
            projectile_exit_margin: PROJECTILE_EXIT_MARGIN,
            hazard_radius: HAZARD_RADIUS,
            hazard_min_speed: HAZARD_MIN_SPEED,
            hazard_max_speed: HAZARD_MAX_SPEED,
            hazard_exit_margin: HAZARD_EXIT_MARGIN,
            hazard_spawn_interval: HAZARD_SPAWN_INTERVAL,
            craft_hit_margin: CRAFT_HIT_MARGIN,
            score_per_hit: SCORE_PER_HIT,
        }
    }
}

impl WorldConfig {
    /// Lane position for owner `index` out of `count`.
    ///
    /// Lanes divide the width into `count + 2` slots so nobody spawns
    /// flush against a wall. The result is always inside the craft bounds,
    /// so lanes pile up at the right edge once there are many owners.
    pub fn lane_position(&self, index: usize, count: usize) -> Vec2 {
        let x = self.width * (index as f32 + 1.0) / (count as f32 + 2.0);
        Vec2::new(x, self.height - self.ship_row_offset).clamp(self.craft_min(), self.craft_max())
    }

    /// Lowest corner a craft may occupy.
    pub fn craft_min(&self) -> Vec2 {
        Vec2::new(self.ship_half_extent, self.ship_half_extent)
    }

    /// Highest corner a craft may occupy.
    pub fn craft_max(&self) -> Vec2 {
        Vec2::new(
            self.width - self.ship_half_extent,
            self.height - self.ship_half_extent,
        )
    }
}
