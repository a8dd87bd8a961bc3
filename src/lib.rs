//! # Maze Arena Server
//!
//! Authoritative simulation core for a multiplayer vehicular-combat maze
//! arena: seeded maze generation, entity lifecycles, hitscan and projectile
//! damage, proximity-triggered walls, and the host/replica authority split.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MAZE ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector on the ground plane             │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── authority.rs- Host/replica authority tags               │
//! │  ├── arena.rs    - Kruskal maze generation                   │
//! │  ├── obstacle.rs - Dynamic walls and proximity triggers      │
//! │  ├── damage.rs   - Hitscan and projectile resolution         │
//! │  ├── lifecycle.rs- Respawn, ghosting, elimination            │
//! │  ├── state.rs    - Match state and replication snapshots     │
//! │  └── tick.rs     - Authoritative loop, recording, replay     │
//! │                                                              │
//! │  network/        - Hosting (non-deterministic)               │
//! │  ├── protocol.rs - Command and broadcast messages            │
//! │  ├── session.rs  - Match session management                  │
//! │  └── host.rs     - Fixed-rate tokio host                     │
//! │                                                              │
//! │  config.rs       - JSON server configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic on the authority:
//! - No floating-point arithmetic in simulation (floats only in config)
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+
//!
//! Every peer regenerates the same maze from the arena seed, and replaying
//! a [`game::tick::MatchRecording`] reproduces the live state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::vec2::FixedVec2;
pub use core::rng::DeterministicRng;
pub use game::input::{InputFrame, PlayerInputBuffer};
pub use game::state::{ArenaMatch, PlayerEntity, PlayerId};
pub use config::{ServerConfig, ConfigError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
