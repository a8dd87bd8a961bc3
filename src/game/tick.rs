//! Authoritative Simulation Tick
//!
//! The fixed-rate loop run by the authority. Every step iterates in
//! ascending id order over fixed-point state, so two hosts fed the same
//! roster changes and inputs produce the same snapshots and hashes.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::core::fixed::{Fixed, to_fixed};
use crate::core::vec2::FixedVec2;
use crate::game::arena::{MazeLayout, MAX_ARENA_EXTENT};
use crate::game::authority::{AuthorityModel, PeerId};
use crate::game::damage::{build_scene, fire_weapons, step_projectiles, WeaponConfig, WeaponRules};
use crate::game::events::GameEvent;
use crate::game::input::{InputFrame, PlayerInputBuffer};
use crate::game::lifecycle::{apply_hits, refresh_ghosts, update_phase};
use crate::game::movement::{EntityPose, KinematicRelay, MovementRelay, VehicleTuning};
use crate::game::obstacle::{ActuatorRules, ObstacleConfig};
use crate::game::state::{ArenaMatch, MatchPhase, MatchSnapshot, PlayerId};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Match rules in human units, as loaded from configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Health of a fresh life
    pub max_health: u32,
    /// Lives per entity (the last one ends in elimination)
    pub start_lives: u32,
    /// Ghost window after spawning or respawning
    pub ghost_ticks: u32,
    /// Entities needed before the match leaves the waiting room
    pub required_players: usize,
    /// Vehicle collision radius
    pub vehicle_radius: f64,
    /// Live projectile cap; the oldest is dropped beyond it
    pub max_projectiles: usize,
    /// Weapon shared by every vehicle
    pub weapon: WeaponConfig,
    /// Dynamic wall actuation
    pub obstacles: ObstacleConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            start_lives: 3,
            ghost_ticks: 90, // 1.5 s at 60 Hz
            required_players: 4,
            vehicle_radius: 1.5,
            max_projectiles: 256,
            weapon: WeaponConfig::default(),
            obstacles: ObstacleConfig::default(),
        }
    }
}

/// Match settings that cannot be played.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchConfigError {
    /// Entities would start dead.
    #[error("max_health must be positive")]
    ZeroHealth,

    /// Entities would start eliminated.
    #[error("start_lives must be positive")]
    ZeroLives,

    /// The waiting room would never fill.
    #[error("required_players must be positive")]
    NoRequiredPlayers,

    /// Radius zero, negative or not finite.
    #[error("vehicle radius must be positive, got {0}")]
    InvalidVehicleRadius(f64),

    /// No room for a single projectile.
    #[error("max_projectiles must be positive")]
    ZeroProjectileCap,

    /// Wall travel inverted.
    #[error("obstacle low height {low} must be below high height {high}")]
    InvertedWallRange {
        /// Configured low height
        low: f64,
        /// Configured high height
        high: f64,
    },

    /// Weapon reach or projectile speed not positive.
    #[error("weapon {0} must be positive")]
    InvalidWeapon(&'static str),
}

impl MatchConfig {
    /// Reject rules the tick cannot run.
    pub fn validate(&self) -> Result<(), MatchConfigError> {
        if self.max_health == 0 {
            return Err(MatchConfigError::ZeroHealth);
        }
        if self.start_lives == 0 {
            return Err(MatchConfigError::ZeroLives);
        }
        if self.required_players == 0 {
            return Err(MatchConfigError::NoRequiredPlayers);
        }
        if !self.vehicle_radius.is_finite() || self.vehicle_radius <= 0.0 {
            return Err(MatchConfigError::InvalidVehicleRadius(self.vehicle_radius));
        }
        if self.max_projectiles == 0 {
            return Err(MatchConfigError::ZeroProjectileCap);
        }
        if self.obstacles.low >= self.obstacles.high {
            return Err(MatchConfigError::InvertedWallRange {
                low: self.obstacles.low,
                high: self.obstacles.high,
            });
        }
        // Rays and offsets must stay inside the fixed-point range
        if !self.weapon.range.is_finite() || self.weapon.range <= 0.0 || self.weapon.range > MAX_ARENA_EXTENT {
            return Err(MatchConfigError::InvalidWeapon("range"));
        }
        let offsets = self.weapon.muzzle_offset.abs() + self.weapon.eye_offset.abs();
        if !offsets.is_finite() || offsets > MAX_ARENA_EXTENT {
            return Err(MatchConfigError::InvalidWeapon("offset"));
        }
        if !self.weapon.projectile_speed.is_finite()
            || self.weapon.projectile_speed <= 0.0
            || self.weapon.projectile_speed > MAX_ARENA_EXTENT
        {
            return Err(MatchConfigError::InvalidWeapon("projectile_speed"));
        }
        Ok(())
    }

    /// Convert to the fixed-point rules the tick runs on.
    pub fn compile(&self) -> MatchRules {
        MatchRules {
            max_health: self.max_health,
            start_lives: self.start_lives,
            ghost_ticks: self.ghost_ticks,
            required_players: self.required_players,
            vehicle_radius: to_fixed(self.vehicle_radius),
            max_projectiles: self.max_projectiles,
            weapon: self.weapon.compile(),
            obstacles: self.obstacles.compile(),
        }
    }
}

/// Fixed-point match rules. Built once per match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchRules {
    /// Health of a fresh life
    pub max_health: u32,
    /// Lives per entity
    pub start_lives: u32,
    /// Ghost window length
    pub ghost_ticks: u32,
    /// Waiting room size
    pub required_players: usize,
    /// Vehicle collision radius
    pub vehicle_radius: Fixed,
    /// Live projectile cap
    pub max_projectiles: usize,
    /// Weapon
    pub weapon: WeaponRules,
    /// Wall actuation
    pub obstacles: ActuatorRules,
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, sorted by (tick, priority, player id)
    pub events: Vec<GameEvent>,
    /// State to replicate; `None` when the tick did not run
    pub snapshot: Option<MatchSnapshot>,
    /// Whether the match is over
    pub match_ended: bool,
    /// Last entity standing, if the match ended this tick
    pub winner: Option<PlayerId>,
}

// =============================================================================
// TICK
// =============================================================================

/// Run one simulation tick.
///
/// No-op on replicas and once the match is finished. `inputs` holds the
/// input in effect for each entity this tick.
pub fn tick(
    arena: &mut ArenaMatch,
    relay: &mut dyn MovementRelay,
    inputs: &BTreeMap<PlayerId, InputFrame>,
    rules: &MatchRules,
) -> TickResult {
    let mut result = TickResult::default();

    if !arena.is_authority() {
        return result;
    }
    if arena.phase == MatchPhase::Finished {
        result.match_ended = true;
        return result;
    }

    // 0. Advance tick counter
    arena.tick += 1;

    // 1. Drive vehicles
    drive_vehicles(arena, relay, inputs);

    // 2. Freeze poses for weapon resolution
    let poses = collect_poses(arena, relay);
    let scene = build_scene(arena, &poses, rules.vehicle_radius);

    // 3. Hitscan shots (ascending shooter), then projectile sweep (ascending id)
    let mut hits = fire_weapons(arena, &scene, &poses, inputs, &rules.weapon, rules.max_projectiles);
    hits.extend(step_projectiles(&mut arena.projectiles, &scene, &rules.weapon));

    // 4. Damage, respawn, elimination
    apply_hits(arena, relay, &hits, rules);

    // 5. Ghost windows against post-respawn poses
    let poses = collect_poses(arena, relay);
    refresh_ghosts(arena, relay, &poses, rules);

    // 6. Phase transitions
    if let Some(winner) = update_phase(arena, rules) {
        result.match_ended = true;
        result.winner = winner;
    }

    // 7. Dynamic walls
    let bodies = live_bodies(arena, &poses);
    arena.proximity.update(&mut arena.walls, &bodies, rules.vehicle_radius);
    arena.walls.actuate();

    // 8. Replication
    let spawns = arena.take_spawns();
    result.snapshot = Some(arena.snapshot(relay, spawns));
    result.events = arena.take_events();
    result.events.sort();

    #[cfg(feature = "debug-tracing")]
    trace!(
        tick = arena.tick,
        hits = hits.len(),
        projectiles = arena.projectiles.len(),
        events = result.events.len(),
        "Tick complete"
    );

    result
}

/// Apply driver input to every non-eliminated entity that sent some.
fn drive_vehicles(arena: &ArenaMatch, relay: &mut dyn MovementRelay, inputs: &BTreeMap<PlayerId, InputFrame>) {
    for (id, input) in inputs {
        let Some(player) = arena.players.get(id) else {
            continue;
        };
        if player.eliminated {
            continue;
        }
        if !relay.drive(*id, input) {
            trace!("No movement body for {}, input skipped", hex::encode(&id.0[..4]));
        }
    }
}

/// Poses of every entity with a body.
fn collect_poses(arena: &ArenaMatch, relay: &dyn MovementRelay) -> BTreeMap<PlayerId, EntityPose> {
    arena
        .players
        .keys()
        .filter_map(|id| relay.pose(*id).map(|pose| (*id, pose)))
        .collect()
}

/// Positions of non-eliminated entities, for wall triggers.
fn live_bodies(arena: &ArenaMatch, poses: &BTreeMap<PlayerId, EntityPose>) -> Vec<(PlayerId, FixedVec2)> {
    arena
        .players
        .values()
        .filter(|p| p.is_alive())
        .filter_map(|p| poses.get(&p.id).map(|pose| (p.id, pose.position)))
        .collect()
}

// =============================================================================
// RECORDING AND REPLAY
// =============================================================================

/// A roster change applied between ticks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterChange {
    /// Entity spawned
    Join {
        /// Requested display name
        display_name: String,
        /// Process driving the entity
        input_owner: PeerId,
    },
    /// Entity left
    Leave,
    /// Display name registered
    Rename {
        /// Requested display name
        display_name: String,
    },
}

/// A roster change stamped with the tick count at which it was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Ticks completed when the change was applied
    pub tick: u32,
    /// Entity affected
    pub player_id: PlayerId,
    /// The change
    pub change: RosterChange,
}

/// Everything needed to re-run a match: roster changes, input deltas and
/// how far it went. The arena is regenerated from `arena_seed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRecording {
    /// Arena seed the match ran on
    pub arena_seed: u64,
    /// Roster changes in application order
    pub roster: Vec<RosterEntry>,
    /// Input deltas per entity
    pub inputs: BTreeMap<PlayerId, PlayerInputBuffer>,
    /// Ticks simulated
    pub tick_count: u32,
}

impl MatchRecording {
    /// Create an empty recording.
    pub fn new(arena_seed: u64) -> Self {
        Self {
            arena_seed,
            roster: Vec::new(),
            inputs: BTreeMap::new(),
            tick_count: 0,
        }
    }

    /// Record a roster change applied after `tick` ticks.
    pub fn record_roster(&mut self, tick: u32, player_id: PlayerId, change: RosterChange) {
        self.roster.push(RosterEntry { tick, player_id, change });
    }

    /// Record the input an entity used on `tick`.
    pub fn record_input(&mut self, tick: u32, player_id: PlayerId, frame: InputFrame) {
        let seed = self.arena_seed;
        self.inputs
            .entry(player_id)
            .or_insert_with(|| PlayerInputBuffer::new(player_id, seed))
            .record(tick, frame);
    }

    /// Note that `tick` has been simulated.
    pub fn finish_tick(&mut self, tick: u32) {
        self.tick_count = self.tick_count.max(tick);
    }
}

/// Apply a roster change to a host-side match. Live sessions and replays
/// share this path.
pub fn apply_roster_change(
    arena: &mut ArenaMatch,
    relay: &mut KinematicRelay,
    entry: &RosterEntry,
    rules: &MatchRules,
) -> bool {
    let id = entry.player_id;
    match &entry.change {
        RosterChange::Join { display_name, input_owner } => {
            if arena.players.contains_key(&id) {
                return false;
            }
            relay.attach(id, EntityPose::default());
            let added = arena.add_player(relay, id, display_name, *input_owner, rules);
            if !added {
                relay.detach(id);
            }
            added
        }
        RosterChange::Leave => {
            let removed = arena.remove_player(&id);
            relay.detach(id);
            removed
        }
        RosterChange::Rename { display_name } => arena.register_display_name(&id, display_name),
    }
}

/// Inputs for the tick about to run: the recorded frame for every entity
/// present, idle for those that never sent one.
pub fn inputs_for_tick(
    arena: &ArenaMatch,
    recording: &MatchRecording,
    tick: u32,
) -> BTreeMap<PlayerId, InputFrame> {
    arena
        .players
        .keys()
        .map(|id| {
            let frame = recording
                .inputs
                .get(id)
                .map(|buffer| buffer.get_input_at(tick))
                .unwrap_or_else(InputFrame::new);
            (*id, frame)
        })
        .collect()
}

/// Replay a recorded match on a fresh host.
///
/// Returns the final match and every event emitted.
pub fn replay_match(
    layout: MazeLayout,
    rules: &MatchRules,
    tuning: &VehicleTuning,
    recording: &MatchRecording,
) -> (ArenaMatch, Vec<GameEvent>) {
    let mut relay = KinematicRelay::new(tuning).with_bounds(layout.floor_bounds());
    let mut arena = ArenaMatch::new(layout, AuthorityModel::host(), rules);
    let mut all_events = Vec::new();
    let mut roster = recording.roster.iter().peekable();

    while arena.tick < recording.tick_count {
        while let Some(entry) = roster.next_if(|e| e.tick <= arena.tick) {
            apply_roster_change(&mut arena, &mut relay, entry, rules);
        }

        let inputs = inputs_for_tick(&arena, recording, arena.tick + 1);
        let result = tick(&mut arena, &mut relay, &inputs, rules);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (arena, all_events)
}
