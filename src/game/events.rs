//! Game Events
//!
//! Events generated during simulation for replication, logging and replay
//! comparison.

use serde::{Serialize, Deserialize};
use crate::core::vec2::FixedVec2;
use crate::game::state::{PlayerId, MatchPhase};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Eliminations first
    PlayerElimination = 0,
    /// Then kill credit
    KillCredit = 1,
    /// Then respawns
    Respawn = 2,
    /// Then non-lethal damage
    Damage = 3,
    /// Then projectile spawns
    Projectile = 4,
    /// Join, leave, rename
    Roster = 5,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Entity joined and was placed at a spawn point
    PlayerJoined {
        player_id: PlayerId,
        display_name: String,
        spawn: FixedVec2,
    },

    /// Entity left the match
    PlayerLeft {
        player_id: PlayerId,
    },

    /// Display name registered or changed
    DisplayNameRegistered {
        player_id: PlayerId,
        display_name: String,
    },

    /// Health reduced
    DamageApplied {
        victim_id: PlayerId,
        attacker_id: Option<PlayerId>,
        amount: u32,
        health: u32,
    },

    /// Lost a life and came back at a spawn point
    Respawned {
        player_id: PlayerId,
        lives: u32,
        spawn: FixedVec2,
    },

    /// Out of lives
    PlayerEliminated {
        victim_id: PlayerId,
        killer_id: Option<PlayerId>,
    },

    /// Kill credited for an elimination
    KillCredited {
        killer_id: PlayerId,
        victim_id: PlayerId,
        kills: u32,
    },

    /// A projectile left a muzzle
    ProjectileSpawned {
        projectile_id: u32,
        owner_id: PlayerId,
        position: FixedVec2,
        direction: FixedVec2,
    },

    /// Match phase changed
    PhaseChanged {
        old_phase: MatchPhase,
        new_phase: MatchPhase,
    },

    /// Match ended
    MatchEnded {
        winner_id: Option<PlayerId>,
        duration_ticks: u32,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerJoined { player_id, .. } => Some(*player_id),
            GameEventData::PlayerLeft { player_id } => Some(*player_id),
            GameEventData::DisplayNameRegistered { player_id, .. } => Some(*player_id),
            GameEventData::DamageApplied { victim_id, .. } => Some(*victim_id),
            GameEventData::Respawned { player_id, .. } => Some(*player_id),
            GameEventData::PlayerEliminated { victim_id, .. } => Some(*victim_id),
            GameEventData::KillCredited { killer_id, .. } => Some(*killer_id),
            GameEventData::ProjectileSpawned { owner_id, .. } => Some(*owner_id),
            GameEventData::MatchEnded { winner_id, .. } => *winner_id,
            GameEventData::PhaseChanged { .. } => None,
        };

        Self {
            tick,
            priority,
            player_id,
            data,
        }
    }

    /// Create player joined event.
    pub fn player_joined(tick: u32, player_id: PlayerId, display_name: String, spawn: FixedVec2) -> Self {
        Self::new(
            tick,
            EventPriority::Roster,
            GameEventData::PlayerJoined { player_id, display_name, spawn },
        )
    }

    /// Create player left event.
    pub fn player_left(tick: u32, player_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Roster, GameEventData::PlayerLeft { player_id })
    }

    /// Create display name event.
    pub fn display_name_registered(tick: u32, player_id: PlayerId, display_name: String) -> Self {
        Self::new(
            tick,
            EventPriority::Roster,
            GameEventData::DisplayNameRegistered { player_id, display_name },
        )
    }

    /// Create damage event.
    pub fn damage_applied(
        tick: u32,
        victim_id: PlayerId,
        attacker_id: Option<PlayerId>,
        amount: u32,
        health: u32,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::DamageApplied { victim_id, attacker_id, amount, health },
        )
    }

    /// Create respawn event.
    pub fn respawned(tick: u32, player_id: PlayerId, lives: u32, spawn: FixedVec2) -> Self {
        Self::new(
            tick,
            EventPriority::Respawn,
            GameEventData::Respawned { player_id, lives, spawn },
        )
    }

    /// Create player eliminated event.
    pub fn player_eliminated(tick: u32, victim_id: PlayerId, killer_id: Option<PlayerId>) -> Self {
        Self::new(
            tick,
            EventPriority::PlayerElimination,
            GameEventData::PlayerEliminated { victim_id, killer_id },
        )
    }

    /// Create kill credited event.
    pub fn kill_credited(tick: u32, killer_id: PlayerId, victim_id: PlayerId, kills: u32) -> Self {
        Self::new(
            tick,
            EventPriority::KillCredit,
            GameEventData::KillCredited { killer_id, victim_id, kills },
        )
    }

    /// Create projectile spawned event.
    pub fn projectile_spawned(
        tick: u32,
        projectile_id: u32,
        owner_id: PlayerId,
        position: FixedVec2,
        direction: FixedVec2,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Projectile,
            GameEventData::ProjectileSpawned { projectile_id, owner_id, position, direction },
        )
    }

    /// Create phase changed event.
    pub fn phase_changed(tick: u32, old_phase: MatchPhase, new_phase: MatchPhase) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::PhaseChanged { old_phase, new_phase })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, winner_id: Option<PlayerId>) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::MatchEnded {
                winner_id,
                duration_ticks: tick,
            },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.player_id == other.player_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then player_id
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.player_id.cmp(&other.player_id))
    }
}
