//! Network Layer
//!
//! In-process hosting of the authority: command intake, the fixed-rate
//! loop and snapshot fan-out. This layer is **non-deterministic** (wall
//! clock, task scheduling); all game logic runs through `game/`.

pub mod protocol;
pub mod session;
pub mod host;

pub use protocol::{HostCommand, ServerMessage};
pub use session::{MatchSession, SessionConfig, SessionError};
pub use host::{AuthorityHost, HostHandle, HostError, HostSummary};
