//! Core deterministic primitives.
//!
//! Every peer that replays the same inputs against the same arena seed must
//! arrive at the same state hash, so nothing here touches floats or hashed
//! iteration order.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, Wide, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
