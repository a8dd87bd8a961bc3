//! Game Logic Module
//!
//! All match simulation code. Deterministic on the authority.
//!
//! ## Module Structure
//!
//! - `authority`: Authority tags and the host/replica model
//! - `input`: Input capture, normalization, buffering
//! - `state`: Match state, entities, snapshots
//! - `tick`: Authoritative simulation loop, recording and replay
//! - `movement`: Vehicle physics collaborator
//! - `arena`: Kruskal maze generation
//! - `obstacle`: Dynamic walls and proximity triggers
//! - `collision`: Ray sweeps and overlap tests
//! - `damage`: Hitscan and projectile resolution
//! - `lifecycle`: Respawn, ghosting, elimination, phases
//! - `spectate`: Local spectator camera
//! - `visual`: Replica-side projectile visuals
//! - `events`: Game events for replication and replay

pub mod authority;
pub mod input;
pub mod state;
pub mod tick;
pub mod movement;
pub mod arena;
pub mod obstacle;
pub mod collision;
pub mod damage;
pub mod lifecycle;
pub mod spectate;
pub mod visual;
pub mod events;

// Re-export key types
pub use authority::{Authority, AuthorityModel, PeerId};
pub use input::{InputFrame, InputDelta, PlayerInputBuffer, MOVE_LUT};
pub use state::{ArenaMatch, PlayerEntity, PlayerId, MatchPhase, MatchSnapshot, EntityView, DamageOutcome};
pub use tick::{MatchConfig, MatchRules, TickResult, MatchRecording, RosterChange, RosterEntry};
pub use movement::{EntityPose, MovementRelay, KinematicRelay, VehicleTuning};
pub use arena::{ArenaConfig, ArenaGenerator, MazeLayout, SpawnPoint};
pub use obstacle::{ObstacleConfig, WallMode, WallSet};
pub use damage::{WeaponConfig, WeaponKind, ProjectileSpawn};
pub use events::{GameEvent, GameEventData};
