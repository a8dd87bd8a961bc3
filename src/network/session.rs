//! Match Session Management
//!
//! Owns one match on the authority: the arena, the movement collaborator,
//! the latest input per player and the replay recording. Commands from
//! collaborators are applied between ticks.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::game::arena::MazeLayout;
use crate::game::authority::AuthorityModel;
use crate::game::input::InputFrame;
use crate::game::movement::{KinematicRelay, VehicleTuning};
use crate::game::state::{ArenaMatch, MatchPhase, PlayerId};
use crate::game::tick::{
    apply_roster_change, tick, MatchRecording, MatchRules, RosterChange, RosterEntry, TickResult,
};
use crate::network::protocol::HostCommand;

/// Configuration for a match session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum players in the match.
    pub max_players: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_players: 4 }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Session is full.
    #[error("Session is full")]
    SessionFull,

    /// Command names an entity that is not in the match.
    #[error("Player not found")]
    UnknownPlayer,

    /// Match already finished.
    #[error("Match not running")]
    MatchNotRunning,

    /// Joins close once the match leaves the waiting room.
    #[error("Match already started")]
    MatchAlreadyStarted,
}

fn short(id: &PlayerId) -> String {
    hex::encode(&id.0[..4])
}

/// A match session.
pub struct MatchSession {
    /// Session configuration.
    pub config: SessionConfig,
    arena: ArenaMatch,
    relay: KinematicRelay,
    rules: MatchRules,
    latest_inputs: BTreeMap<PlayerId, InputFrame>,
    recording: MatchRecording,
}

impl MatchSession {
    /// Create a session hosting `layout` on this process.
    pub fn new(layout: MazeLayout, rules: MatchRules, tuning: &VehicleTuning, config: SessionConfig) -> Self {
        let relay = KinematicRelay::new(tuning).with_bounds(layout.floor_bounds());
        let recording = MatchRecording::new(layout.seed);
        Self {
            config,
            arena: ArenaMatch::new(layout, AuthorityModel::host(), &rules),
            relay,
            rules,
            latest_inputs: BTreeMap::new(),
            recording,
        }
    }

    /// Match state.
    pub fn arena(&self) -> &ArenaMatch {
        &self.arena
    }

    /// Movement collaborator.
    pub fn relay(&self) -> &KinematicRelay {
        &self.relay
    }

    /// Rules the match runs on.
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Roster changes and inputs so far.
    pub fn recording(&self) -> &MatchRecording {
        &self.recording
    }

    /// Get player count.
    pub fn player_count(&self) -> usize {
        self.arena.players.len()
    }

    /// Get current tick.
    pub fn current_tick(&self) -> u32 {
        self.arena.tick
    }

    /// True once the match is over.
    pub fn is_finished(&self) -> bool {
        self.arena.phase == MatchPhase::Finished
    }

    /// Apply one command. Redelivered commands converge to the same state.
    pub fn handle_command(&mut self, command: HostCommand) -> Result<(), SessionError> {
        match command {
            HostCommand::Join { player_id, display_name, peer } => {
                if self.arena.players.contains_key(&player_id) {
                    return Ok(());
                }
                if self.arena.phase != MatchPhase::Waiting {
                    return Err(SessionError::MatchAlreadyStarted);
                }
                if self.arena.players.len() >= self.config.max_players {
                    return Err(SessionError::SessionFull);
                }
                let change = RosterChange::Join { display_name, input_owner: peer };
                if self.apply_roster(player_id, change) {
                    info!(
                        "Player {} joined ({}/{})",
                        short(&player_id),
                        self.arena.players.len(),
                        self.config.max_players
                    );
                }
                Ok(())
            }

            HostCommand::Leave { player_id } => {
                self.latest_inputs.remove(&player_id);
                if self.apply_roster(player_id, RosterChange::Leave) {
                    info!("Player {} left", short(&player_id));
                } else {
                    debug!("Leave for unknown player {}", short(&player_id));
                }
                Ok(())
            }

            HostCommand::Input { player_id, frame } => {
                if !self.arena.players.contains_key(&player_id) {
                    return Err(SessionError::UnknownPlayer);
                }
                if self.is_finished() {
                    return Err(SessionError::MatchNotRunning);
                }
                self.latest_inputs.insert(player_id, frame);
                Ok(())
            }

            HostCommand::SetDisplayName { player_id, display_name } => {
                if !self.arena.players.contains_key(&player_id) {
                    return Err(SessionError::UnknownPlayer);
                }
                self.apply_roster(player_id, RosterChange::Rename { display_name });
                Ok(())
            }

            HostCommand::SetSpectateTarget { player_id } => {
                if self.arena.set_spectate_target(player_id) {
                    Ok(())
                } else {
                    Err(SessionError::UnknownPlayer)
                }
            }
        }
    }

    /// Apply a roster change and record it if it took effect.
    fn apply_roster(&mut self, player_id: PlayerId, change: RosterChange) -> bool {
        let entry = RosterEntry { tick: self.arena.tick, player_id, change };
        let applied = apply_roster_change(&mut self.arena, &mut self.relay, &entry, &self.rules);
        if applied {
            self.recording.roster.push(entry);
        }
        applied
    }

    /// Run a single game tick with the latest input of every entity.
    ///
    /// Returns `None` once the match is finished.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        if self.is_finished() {
            return None;
        }

        let next = self.arena.tick + 1;
        let inputs: BTreeMap<PlayerId, InputFrame> = self
            .arena
            .players
            .keys()
            .map(|id| (*id, self.latest_inputs.get(id).copied().unwrap_or_else(InputFrame::new)))
            .collect();
        for (id, frame) in &inputs {
            self.recording.record_input(next, *id, *frame);
        }

        let result = tick(&mut self.arena, &mut self.relay, &inputs, &self.rules);
        self.recording.finish_tick(self.arena.tick);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::{ArenaConfig, ArenaGenerator};
    use crate::game::authority::PeerId;
    use crate::game::tick::{replay_match, MatchConfig};

    fn create_test_session(max_players: usize) -> MatchSession {
        let layout = ArenaGenerator::generate_from(&ArenaConfig { rows: 5, cols: 5, ..ArenaConfig::default() }).unwrap();
        let rules = MatchConfig { required_players: max_players, ..MatchConfig::default() }.compile();
        MatchSession::new(layout, rules, &VehicleTuning::default(), SessionConfig { max_players })
    }

    fn join(id: PlayerId, name: &str) -> HostCommand {
        HostCommand::Join { player_id: id, display_name: name.into(), peer: PeerId(id.0[0] as u32) }
    }

    #[tokio::test]
    async fn test_add_remove_player() {
        let mut session = create_test_session(4);
        let player_id = PlayerId::new([1; 16]);
        session.handle_command(join(player_id, "one")).unwrap();
        assert_eq!(session.player_count(), 1);
        assert!(session.relay().body(player_id).is_some());

        session.handle_command(HostCommand::Leave { player_id }).unwrap();
        assert_eq!(session.player_count(), 0);
        assert!(session.relay().body(player_id).is_none());

        // Unknown leave is a no-op
        assert!(session.handle_command(HostCommand::Leave { player_id }).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_join_is_idempotent() {
        let mut session = create_test_session(4);
        let player_id = PlayerId::new([1; 16]);
        session.handle_command(join(player_id, "one")).unwrap();
        session.handle_command(join(player_id, "one")).unwrap();
        assert_eq!(session.player_count(), 1);
        assert_eq!(session.recording().roster.len(), 1);
    }

    #[tokio::test]
    async fn test_session_full() {
        let mut session = create_test_session(2);
        for i in 1..=2 {
            session.handle_command(join(PlayerId::new([i; 16]), "p")).unwrap();
        }
        let result = session.handle_command(join(PlayerId::new([99; 16]), "late"));
        assert_eq!(result, Err(SessionError::SessionFull));
    }

    #[tokio::test]
    async fn test_join_closed_after_start() {
        let mut session = create_test_session(2);
        session.handle_command(join(PlayerId::new([1; 16]), "a")).unwrap();
        session.handle_command(join(PlayerId::new([2; 16]), "b")).unwrap();
        session.run_tick();
        assert_eq!(session.arena().phase, MatchPhase::Running);

        // A leave frees a slot but the match has started
        session.handle_command(HostCommand::Leave { player_id: PlayerId::new([2; 16]) }).unwrap();
        let result = session.handle_command(join(PlayerId::new([3; 16]), "c"));
        assert_eq!(result, Err(SessionError::MatchAlreadyStarted));
    }

    #[tokio::test]
    async fn test_unknown_player_commands() {
        let mut session = create_test_session(4);
        let ghost = PlayerId::new([9; 16]);
        assert_eq!(
            session.handle_command(HostCommand::Input { player_id: ghost, frame: InputFrame::new() }),
            Err(SessionError::UnknownPlayer)
        );
        assert_eq!(
            session.handle_command(HostCommand::SetDisplayName { player_id: ghost, display_name: "x".into() }),
            Err(SessionError::UnknownPlayer)
        );
        assert_eq!(
            session.handle_command(HostCommand::SetSpectateTarget { player_id: ghost }),
            Err(SessionError::UnknownPlayer)
        );
    }

    #[tokio::test]
    async fn test_display_name_sanitized() {
        let mut session = create_test_session(4);
        let id = PlayerId::new([1; 16]);
        session.handle_command(join(id, "   ")).unwrap();
        assert_eq!(session.arena().get_player(&id).unwrap().display_name, "Player");

        session.handle_command(HostCommand::SetDisplayName { player_id: id, display_name: "  Viper  ".into() }).unwrap();
        session.handle_command(HostCommand::SetDisplayName { player_id: id, display_name: "Viper".into() }).unwrap();
        assert_eq!(session.arena().get_player(&id).unwrap().display_name, "Viper");
        let renames = session
            .recording()
            .roster
            .iter()
            .filter(|e| matches!(e.change, RosterChange::Rename { .. }))
            .count();
        assert_eq!(renames, 1);
    }

    #[tokio::test]
    async fn test_run_tick() {
        let mut session = create_test_session(2);
        session.handle_command(join(PlayerId::new([1; 16]), "a")).unwrap();
        session.handle_command(join(PlayerId::new([2; 16]), "b")).unwrap();

        let result = session.run_tick();
        assert!(result.is_some());
        assert_eq!(session.current_tick(), 1);
        let snapshot = result.unwrap().snapshot.unwrap();
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.phase, MatchPhase::Running);
    }

    #[tokio::test]
    async fn test_leave_ends_duel() {
        let mut session = create_test_session(2);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        session.handle_command(join(a, "a")).unwrap();
        session.handle_command(join(b, "b")).unwrap();
        session.run_tick();

        session.handle_command(HostCommand::Leave { player_id: b }).unwrap();
        let result = session.run_tick().unwrap();
        assert!(result.match_ended);
        assert_eq!(result.winner, Some(a));
        assert!(session.run_tick().is_none());
        assert_eq!(
            session.handle_command(HostCommand::Input { player_id: a, frame: InputFrame::new() }),
            Err(SessionError::MatchNotRunning)
        );
    }

    #[tokio::test]
    async fn test_recording_replays_to_same_hash() {
        let mut session = create_test_session(4);
        for i in 1..=4u8 {
            session.handle_command(join(PlayerId::new([i; 16]), "driver")).unwrap();
        }
        for t in 0..240u32 {
            for i in 1..=4u8 {
                let mut frame = InputFrame::with_drive(100, if t % 60 < 30 { 40 } else { -40 });
                if (t + i as u32) % 7 == 0 {
                    frame = frame.aimed(90, 90).firing();
                }
                session
                    .handle_command(HostCommand::Input { player_id: PlayerId::new([i; 16]), frame })
                    .unwrap_or(());
            }
            if session.run_tick().is_none() {
                break;
            }
        }

        let layout = ArenaGenerator::generate_from(&ArenaConfig { rows: 5, cols: 5, ..ArenaConfig::default() }).unwrap();
        let (replayed, _) = replay_match(layout, session.rules(), &VehicleTuning::default(), session.recording());
        assert_eq!(replayed.tick, session.current_tick());
        assert_eq!(replayed.compute_hash(), session.arena().compute_hash());
    }
}
