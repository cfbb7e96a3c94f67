//! # Rockfall Server
//!
//! Authoritative multiplayer server for a cooperative arcade shooter.
//! Players steer crafts along the bottom of the arena and shoot down
//! falling hazards; the server owns the only copy of the world.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ROCKFALL SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── vec2.rs     - 2D vector math                            │
//! │  └── id.rs       - Session identifiers                       │
//! │                                                              │
//! │  game/           - Simulation                                │
//! │  ├── config.rs   - World constants                           │
//! │  ├── input.rs    - Control flags and batches                 │
//! │  ├── state.rs    - World, entities, snapshots                │
//! │  ├── tick.rs     - One authoritative step                    │
//! │  ├── collision.rs- Parallel hit scan                         │
//! │  └── store.rs    - Lock-guarded world owner                  │
//! │                                                              │
//! │  network/        - TCP transport                             │
//! │  ├── protocol.rs - Envelopes and message kinds               │
//! │  ├── framing.rs  - Newline framing                           │
//! │  ├── registry.rs - Live sessions                             │
//! │  ├── session.rs  - Per-connection handler                    │
//! │  ├── broadcast.rs- Snapshot fan-out                          │
//! │  └── server.rs   - Accept and tick loops                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One task accepts connections, one task per client reads its socket
//! (plus a writer task), and one task runs the tick loop. Ticks are
//! strictly sequential; only the projectile/hazard scan inside a tick
//! runs in parallel, and it is read-only.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::id::SessionId;
pub use crate::core::vec2::Vec2;
pub use game::config::WorldConfig;
pub use game::input::ControlState;
pub use game::state::{World, WorldSnapshot};
pub use game::store::StateStore;
pub use network::server::{GameServer, ServerConfig, ServerError, ServerHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
