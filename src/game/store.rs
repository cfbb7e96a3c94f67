//! Simulation State Store
//!
//! Sole owner of the World. Every access goes through one mutex, so the
//! tick, snapshots and disconnect cleanup never interleave.
//!
//! The store also tracks which owners are connected. Input from an owner
//! that has already left is dropped, so a batch gathered before a
//! disconnect cannot bring the departed craft back.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::core::id::SessionId;
use crate::game::config::WorldConfig;
use crate::game::input::InputBatch;
use crate::game::state::{Hazard, World, WorldSnapshot};
use crate::game::tick::{self, TickResult};
use crate::network::registry::SessionListener;

struct StoreInner {
    world: World,
    rng: StdRng,
    /// Owners whose session is registered
    live: BTreeSet<SessionId>,
}

/// Lock-guarded owner of the shared world.
pub struct StateStore {
    config: WorldConfig,
    inner: Mutex<StoreInner>,
}

impl StateStore {
    /// Create a store with an empty world.
    ///
    /// A seed makes hazard spawning reproducible.
    pub fn new(config: WorldConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            inner: Mutex::new(StoreInner {
                world: World::new(),
                rng,
                live: BTreeSet::new(),
            }),
        }
    }

    /// World configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // Poison is ignored; a half-applied tick is still a valid world.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one tick with the given inputs.
    pub fn advance(&self, inputs: &InputBatch) -> TickResult {
        let mut guard = self.lock();
        Self::advance_locked(&mut guard, inputs, &self.config)
    }

    /// Run one tick and copy the result under a single lock.
    pub fn advance_and_snapshot(&self, inputs: &InputBatch) -> (TickResult, WorldSnapshot) {
        let mut guard = self.lock();
        let result = Self::advance_locked(&mut guard, inputs, &self.config);
        (result, guard.world.snapshot())
    }

    fn advance_locked(inner: &mut StoreInner, inputs: &InputBatch, config: &WorldConfig) -> TickResult {
        let StoreInner { world, rng, live } = inner;

        let stale = inputs.keys().filter(|owner| !live.contains(*owner)).count();
        let result = if stale == 0 {
            tick::advance(world, inputs, config, rng)
        } else {
            debug!(count = stale, "Dropping input from departed owners");
            let current: InputBatch = inputs
                .iter()
                .filter(|(owner, _)| live.contains(*owner))
                .map(|(owner, controls)| (owner.clone(), *controls))
                .collect();
            tick::advance(world, &current, config, rng)
        };

        if result.reset {
            info!(crafts = world.crafts.len(), "World reset");
        }
        if result.crafts_spawned > 0 {
            info!(count = result.crafts_spawned, total = world.crafts.len(), "Crafts created");
        }
        if result.crafts_lost > 0 {
            info!(count = result.crafts_lost, alive = world.alive_craft_count(), "Crafts destroyed");
        }
        if result.game_over_started {
            info!(tick = world.tick, score = world.score, "Game over");
        }

        result
    }

    /// Copy of the current world.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.lock().world.snapshot()
    }

    /// Accept input from `owner` from now on.
    pub fn register_owner(&self, owner: &SessionId) {
        self.lock().live.insert(owner.clone());
    }

    /// Stop accepting input from `owner` and remove its craft.
    ///
    /// Returns true if a craft existed.
    pub fn remove_craft(&self, owner: &SessionId) -> bool {
        let mut guard = self.lock();
        guard.live.remove(owner);
        let removed = guard.world.remove_craft(owner);
        if removed {
            info!(owner = %owner.short(), game_over = guard.world.game_over, "Craft removed");
        }
        removed
    }

    /// Place a hazard directly.
    pub fn spawn_hazard(&self, hazard: Hazard) {
        self.lock().world.hazards.push(hazard);
    }
}

impl SessionListener for StateStore {
    fn session_added(&self, id: &SessionId) {
        self.register_owner(id);
    }

    fn session_removed(&self, id: &SessionId) {
        self.remove_craft(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::input::ControlState;
    use crate::network::registry::{Registry, Session};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn quiet_store() -> StateStore {
        let config = WorldConfig {
            hazard_spawn_interval: 0,
            ..Default::default()
        };
        let store = StateStore::new(config, Some(1));
        for owner in ["a", "b"] {
            store.register_owner(&SessionId::new(owner));
        }
        store
    }

    fn fire() -> ControlState {
        ControlState { fire: true, ..Default::default() }
    }

    #[test]
    fn test_two_owners_fire_two_projectiles() {
        let store = quiet_store();
        let mut inputs = InputBatch::new();
        inputs.insert(SessionId::new("a"), fire());
        inputs.insert(SessionId::new("b"), fire());

        store.advance(&inputs);
        let snap = store.snapshot();
        assert_eq!(snap.crafts.len(), 2);
        assert_eq!(snap.projectiles.len(), 2);
        assert_eq!(snap.score, 0);
    }

    #[test]
    fn test_projectile_meets_placed_hazard() {
        let store = quiet_store();
        let mut inputs = InputBatch::new();
        inputs.insert(SessionId::new("a"), fire());
        store.advance(&inputs);

        let shot = store.snapshot().projectiles[0];
        // Where the shot will be once it moves next tick
        store.spawn_hazard(Hazard::stationary(shot.position + shot.velocity, 5.0));

        store.advance(&InputBatch::new());
        let snap = store.snapshot();
        assert!(snap.projectiles.is_empty());
        assert!(snap.hazards.is_empty());
        assert_eq!(snap.score, 10);
    }

    #[test]
    fn test_listener_removes_craft() {
        let store = quiet_store();
        let mut inputs = InputBatch::new();
        inputs.insert(SessionId::new("a"), ControlState::default());
        store.advance(&inputs);
        assert_eq!(store.snapshot().crafts.len(), 1);

        store.session_removed(&SessionId::new("a"));
        assert!(store.snapshot().crafts.is_empty());
        // Idempotent
        assert!(!store.remove_craft(&SessionId::new("a")));
    }

    #[test]
    fn test_seeded_stores_spawn_identically() {
        let config = WorldConfig {
            hazard_spawn_interval: 5,
            ..Default::default()
        };
        let a = StateStore::new(config.clone(), Some(99));
        let b = StateStore::new(config, Some(99));
        for _ in 0..50 {
            a.advance(&InputBatch::new());
            b.advance(&InputBatch::new());
        }
        let (sa, sb) = (a.snapshot(), b.snapshot());
        assert!(!sa.hazards.is_empty());
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let store = std::sync::Arc::new(quiet_store());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison");
        })
        .join();

        store.spawn_hazard(Hazard::stationary(Vec2::new(10.0, 10.0), 5.0));
        assert_eq!(store.snapshot().hazards.len(), 1);
    }

    #[test]
    fn test_unregistered_owner_gets_no_craft() {
        let store = quiet_store();
        let mut inputs = InputBatch::new();
        inputs.insert(SessionId::new("stranger"), fire());

        let result = store.advance(&inputs);
        assert_eq!(result.crafts_spawned, 0);
        assert!(store.snapshot().crafts.is_empty());
        assert!(store.snapshot().projectiles.is_empty());
    }

    #[test]
    fn test_input_gathered_before_disconnect_does_not_revive_craft() {
        let store = Arc::new(quiet_store());
        let registry = Registry::new(store.clone());
        let (tx, _rx) = mpsc::channel(4);
        let peer = "127.0.0.1:9000".parse().unwrap();
        let session = Arc::new(Session::new(SessionId::new("x"), peer, tx));
        registry.add(session.clone());

        session.set_input(ControlState { up: true, ..Default::default() });
        store.advance(&registry.latest_inputs());
        assert!(store.snapshot().crafts.contains_key(&SessionId::new("x")));

        // The tick loop gathered this batch, then the client left
        let inputs = registry.latest_inputs();
        assert!(registry.remove(&SessionId::new("x")));

        store.advance(&inputs);
        store.advance(&InputBatch::new());
        store.advance(&InputBatch::new());

        let snap = store.snapshot();
        assert_eq!(registry.count_active(), 0);
        assert!(snap.crafts.is_empty());
        assert!(!snap.game_over);
    }

    #[test]
    fn test_rejoined_owner_is_accepted_again() {
        let store = quiet_store();
        let a = SessionId::new("a");
        store.session_removed(&a);
        let mut inputs = InputBatch::new();
        inputs.insert(a.clone(), ControlState::default());

        store.advance(&inputs);
        assert!(store.snapshot().crafts.is_empty());

        store.session_added(&a);
        store.advance(&inputs);
        assert!(store.snapshot().crafts.contains_key(&a));
    }
}
