//! Collision Detection
//!
//! Projectile-vs-hazard scan runs per hazard in parallel over a read-only
//! view; every removal happens afterwards in one sequential merge.
//! Craft-vs-hazard checks are sequential.

use rayon::prelude::*;

use crate::core::vec2::Vec2;
use crate::game::config::WorldConfig;
use crate::game::state::{Hazard, Projectile, World};

/// Check if a point lies within `radius` of a center.
#[inline]
pub fn within_radius(center: Vec2, radius: f32, point: Vec2) -> bool {
    center.distance_squared(point) <= radius * radius
}

/// One projectile-vs-hazard match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    /// Index into the hazard list
    pub hazard: usize,
    /// Index into the projectile list
    pub projectile: usize,
}

/// Outcome of collision resolution for one tick.
#[derive(Debug, Default, PartialEq)]
pub struct CollisionReport {
    /// Hits found by the scan, in hazard order
    pub hits: Vec<Hit>,
    /// Score added this tick
    pub score_added: u64,
    /// Crafts lost this tick
    pub crafts_lost: usize,
}

/// Scan every hazard against every projectile.
///
/// Each hazard records at most one hit: the lowest-index projectile in
/// range. Output is ordered by hazard index regardless of scheduling.
pub fn scan_hits(hazards: &[Hazard], projectiles: &[Projectile]) -> Vec<Hit> {
    hazards
        .par_iter()
        .enumerate()
        .filter_map(|(hazard_index, hazard)| {
            projectiles
                .iter()
                .position(|p| within_radius(hazard.position, hazard.radius, p.position))
                .map(|projectile| Hit { hazard: hazard_index, projectile })
        })
        .collect()
}

/// Remove the given indices from a vector, highest first.
fn remove_indices<T>(items: &mut Vec<T>, mut indices: Vec<usize>) {
    indices.sort_unstable_by(|a, b| b.cmp(a));
    indices.dedup();
    for index in indices {
        if index < items.len() {
            items.remove(index);
        }
    }
}

/// Apply a set of hits: score them, then drop the matched entities.
///
/// Two hazards may share a projectile; both score and the projectile is
/// removed once.
pub fn apply_hits(world: &mut World, hits: &[Hit], score_per_hit: u64) -> u64 {
    let score_added = hits.len() as u64 * score_per_hit;

    remove_indices(&mut world.hazards, hits.iter().map(|h| h.hazard).collect());
    remove_indices(&mut world.projectiles, hits.iter().map(|h| h.projectile).collect());

    world.score += score_added;
    score_added
}

/// Mark crafts touching a hazard as lost.
///
/// A craft dies at most once per tick. Returns the number of crafts lost.
pub fn resolve_craft_hits(world: &mut World, craft_hit_margin: f32) -> usize {
    let hazards = &world.hazards;
    let mut lost = 0;

    for craft in world.crafts.values_mut().filter(|c| c.alive) {
        let struck = hazards.iter().any(|hazard| {
            let reach = hazard.radius + craft_hit_margin;
            craft.position.distance_squared(hazard.position) < reach * reach
        });
        if struck {
            craft.alive = false;
            lost += 1;
        }
    }

    lost
}

/// Full collision pass for one tick.
pub fn resolve_collisions(world: &mut World, config: &WorldConfig) -> CollisionReport {
    let hits = scan_hits(&world.hazards, &world.projectiles);
    let score_added = apply_hits(world, &hits, config.score_per_hit);
    let crafts_lost = resolve_craft_hits(world, config.craft_hit_margin);

    if world.all_crafts_down() {
        world.game_over = true;
    }

    CollisionReport {
        hits,
        score_added,
        crafts_lost,
    }
}
