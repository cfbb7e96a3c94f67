//! Authoritative Simulation Tick
//!
//! One step of the shared world. Pure over its arguments: the only
//! randomness comes from the caller's RNG.

use rand::Rng;

use crate::core::vec2::Vec2;
use crate::game::collision::resolve_collisions;
use crate::game::config::WorldConfig;
use crate::game::input::InputBatch;
use crate::game::state::{Hazard, Projectile, World};

/// Result of a tick.
#[derive(Debug, Default, PartialEq)]
pub struct TickResult {
    /// World was reset this tick
    pub reset: bool,
    /// World is frozen in game over (nothing advanced)
    pub frozen: bool,
    /// Crafts created this tick
    pub crafts_spawned: usize,
    /// Projectiles fired this tick
    pub shots_fired: usize,
    /// Hazards destroyed by projectiles
    pub hazards_destroyed: usize,
    /// Score added this tick
    pub score_added: u64,
    /// Crafts lost this tick
    pub crafts_lost: usize,
    /// A hazard spawned this tick
    pub hazard_spawned: bool,
    /// Game over began this tick
    pub game_over_started: bool,
}

/// Run one simulation tick.
///
/// Order:
/// 1. game-over gate (reset or freeze)
/// 2. crafts for new owners
/// 3. craft movement and fire
/// 4. projectile movement and cleanup
/// 5. hazard movement and cleanup
/// 6. collisions
/// 7. periodic hazard spawn
/// 8. tick counter
pub fn advance<R: Rng>(
    world: &mut World,
    inputs: &InputBatch,
    config: &WorldConfig,
    rng: &mut R,
) -> TickResult {
    let mut result = TickResult::default();

    // 1. Game over: only a reset gets through
    if world.game_over && inputs.values().any(|c| c.reset) {
        world.reset(config);
        result.reset = true;
    }

    // 2. Lazily create crafts. Late joiners during game over wait dead.
    for owner in inputs.keys() {
        if !world.crafts.contains_key(owner) {
            world.spawn_craft(owner.clone(), config, !world.game_over);
            result.crafts_spawned += 1;
        }
    }

    if world.game_over {
        result.frozen = true;
        return result;
    }

    // 3. Movement and fire
    result.shots_fired = apply_inputs(world, inputs, config);

    // 4. Projectiles
    let top_exit = -config.projectile_exit_margin;
    for projectile in &mut world.projectiles {
        projectile.position += projectile.velocity;
    }
    world.projectiles.retain(|p| p.position.y >= top_exit);

    // 5. Hazards
    let bottom_exit = config.height + config.hazard_exit_margin;
    for hazard in &mut world.hazards {
        hazard.position += hazard.velocity;
    }
    world.hazards.retain(|h| h.position.y <= bottom_exit);

    // 6. Collisions
    let report = resolve_collisions(world, config);
    result.hazards_destroyed = report.hits.len();
    result.score_added = report.score_added;
    result.crafts_lost = report.crafts_lost;
    result.game_over_started = world.game_over;

    // 7. Spawn
    if config.hazard_spawn_interval > 0
        && world.tick > 0
        && world.tick % config.hazard_spawn_interval == 0
    {
        world.hazards.push(spawn_hazard(config, rng));
        result.hazard_spawned = true;
    }

    // 8. Tick
    world.tick += 1;

    result
}

/// Move live crafts and fire on rising edges. Returns shots fired.
fn apply_inputs(world: &mut World, inputs: &InputBatch, config: &WorldConfig) -> usize {
    let min = config.craft_min();
    let max = config.craft_max();
    let mut shots = Vec::new();

    // BTreeMap iterates in sorted key order
    for (owner, controls) in inputs {
        let Some(craft) = world.crafts.get_mut(owner) else {
            continue;
        };
        if !craft.alive {
            continue;
        }

        let dir = controls.direction();
        if !dir.is_zero() {
            let step = dir.normalize().scale(config.ship_speed);
            craft.position = (craft.position + step).clamp(min, max);
        }

        if controls.fire && !craft.fire_held {
            shots.push(Projectile::new(
                craft.position - Vec2::new(0.0, config.projectile_offset),
                Vec2::new(0.0, -config.projectile_speed),
            ));
        }
        craft.fire_held = controls.fire;
    }

    let fired = shots.len();
    world.projectiles.extend(shots);
    fired
}

/// Create a hazard just above the top edge at a random column.
pub fn spawn_hazard<R: Rng>(config: &WorldConfig, rng: &mut R) -> Hazard {
    let radius = config.hazard_radius;
    let x = if config.width > 2.0 * radius {
        rng.gen_range(radius..config.width - radius)
    } else {
        config.width / 2.0
    };
    let speed = if config.hazard_max_speed > config.hazard_min_speed {
        rng.gen_range(config.hazard_min_speed..config.hazard_max_speed)
    } else {
        config.hazard_min_speed
    };
    Hazard::new(Vec2::new(x, -radius), Vec2::new(0.0, speed), radius)
}
