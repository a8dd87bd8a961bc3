//! Protocol Messages
//!
//! Structured in-process messages between collaborators and the authority
//! host. Serde-tagged so a transport can carry them as JSON unchanged.

use serde::{Serialize, Deserialize};

use crate::game::authority::PeerId;
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::state::{MatchSnapshot, PlayerId};

// =============================================================================
// COLLABORATOR -> HOST
// =============================================================================

/// Commands queued for the authority, applied between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Spawn an entity for a joining player.
    Join {
        /// Entity id
        player_id: PlayerId,
        /// Requested display name, sanitized on registration
        display_name: String,
        /// Process that will drive the entity
        peer: PeerId,
    },

    /// Remove a player's entity.
    Leave {
        /// Entity id
        player_id: PlayerId,
    },

    /// Latest driver input. Replaces any earlier frame.
    Input {
        /// Entity id
        player_id: PlayerId,
        /// Input frame
        frame: InputFrame,
    },

    /// Register or change a display name.
    SetDisplayName {
        /// Entity id
        player_id: PlayerId,
        /// Requested display name
        display_name: String,
    },

    /// Follow a specific entity with the host's spectator camera.
    SetSpectateTarget {
        /// Entity to follow
        player_id: PlayerId,
    },
}

impl HostCommand {
    /// Entity the command refers to.
    pub fn player_id(&self) -> PlayerId {
        match self {
            HostCommand::Join { player_id, .. }
            | HostCommand::Leave { player_id }
            | HostCommand::Input { player_id, .. }
            | HostCommand::SetDisplayName { player_id, .. }
            | HostCommand::SetSpectateTarget { player_id } => *player_id,
        }
    }
}

// =============================================================================
// HOST -> COLLABORATORS
// =============================================================================

/// Messages published by the host after each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Replicated state for this tick.
    Snapshot(MatchSnapshot),

    /// Events generated this tick, in processing order.
    Events {
        /// Tick the events belong to
        tick: u32,
        /// Events
        events: Vec<GameEvent>,
    },

    /// The match finished.
    MatchEnded {
        /// Last entity standing
        winner: Option<PlayerId>,
        /// Final tick
        tick: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let id = PlayerId::new([7; 16]);
        let cmd = HostCommand::Join { player_id: id, display_name: "Ace".into(), peer: PeerId(3) };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"join\""));

        let back: HostCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
        assert_eq!(back.player_id(), id);
    }

    #[test]
    fn test_server_message_tag() {
        let msg = ServerMessage::MatchEnded { winner: None, tick: 42 };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"match_ended\""));
    }
}
