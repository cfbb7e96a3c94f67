//! Core primitives.
//!
//! Small value types shared by the simulation and the network layer.

pub mod id;
pub mod vec2;

// Re-export core types
pub use id::SessionId;
pub use vec2::Vec2;
