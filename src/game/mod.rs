//! Game Logic Module
//!
//! The shared world and everything that changes it.
//!
//! ## Module Structure
//!
//! - `config`: World constants
//! - `input`: Control flags and per-tick batches
//! - `state`: Crafts, projectiles, hazards, the world and its snapshot
//! - `tick`: One authoritative simulation step
//! - `collision`: Parallel projectile scan and craft hits
//! - `store`: Lock-guarded owner of the world

pub mod config;
pub mod input;
pub mod state;
pub mod tick;
pub mod collision;
pub mod store;

// Re-export key types
pub use config::WorldConfig;
pub use input::{ControlState, InputBatch, InputCommand};
pub use state::{Craft, Hazard, Projectile, World, WorldSnapshot};
pub use store::StateStore;
pub use tick::TickResult;
