//! Game State Definitions
//!
//! All state types for match simulation.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::arena::{MazeLayout, SpawnPoint};
use crate::game::authority::{Authority, AuthorityModel, PeerId};
use crate::game::damage::{Projectile, ProjectileSpawn};
use crate::game::events::GameEvent;
use crate::game::lifecycle;
use crate::game::movement::{EntityPose, MovementRelay};
use crate::game::obstacle::{ProximityTracker, WallSet, WallView};
use crate::game::spectate::SpectatorCamera;
use crate::game::tick::MatchRules;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create a random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// =============================================================================
// DISPLAY NAMES
// =============================================================================

/// Longest display name kept, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;

/// Name used when none (or only whitespace) is supplied.
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

/// Trim, cap at [`MAX_DISPLAY_NAME_CHARS`], and substitute the default for
/// empty names.
pub fn sanitize_display_name(raw: &str) -> String {
    let trimmed: String = raw.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// PLAYER ENTITY
// =============================================================================

/// Result of a single damage transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Replica, eliminated, or ghosted: nothing changed
    Ignored,
    /// Health reduced, still above zero
    Damaged,
    /// Health hit zero with lives remaining; health refilled
    Respawned,
    /// Last life lost
    Eliminated {
        /// Credited attacker, never the victim itself
        killer: Option<PlayerId>,
    },
}

/// Lifecycle state of one vehicle.
///
/// Position and orientation belong to the movement collaborator and are
/// referenced through [`MovementRelay`], never stored here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerEntity {
    /// Unique player ID
    pub id: PlayerId,

    /// Whether this process may mutate the entity
    pub authority: Authority,

    /// Process whose input drives this entity
    pub input_owner: PeerId,

    /// Current health, `0..=max_health`
    pub health: u32,

    /// Health restored on respawn
    pub max_health: u32,

    /// Remaining lives
    pub lives: u32,

    /// Eliminations credited to this entity
    pub kills: u32,

    /// Terminal for the match
    pub eliminated: bool,

    /// Damage-immune and exempt from vehicle collision
    pub ghost: bool,

    /// Last tick of the current ghost window
    pub ghost_until: u32,

    /// Ghosted regardless of timer (waiting room)
    pub forced_ghost: bool,

    /// Tick of the last (re)spawn
    pub spawn_tick: u32,

    /// Sanitized display name
    pub display_name: String,

    /// First tick a new shot is accepted
    pub next_fire_tick: u32,

    /// Tick when eliminated
    pub eliminated_tick: Option<u32>,

    /// Entity credited with the elimination
    pub eliminated_by: Option<PlayerId>,
}

impl PlayerEntity {
    /// Create a live entity with full health.
    pub fn new(
        id: PlayerId,
        authority: Authority,
        input_owner: PeerId,
        display_name: &str,
        max_health: u32,
        lives: u32,
    ) -> Self {
        Self {
            id,
            authority,
            input_owner,
            health: max_health,
            max_health,
            lives,
            kills: 0,
            eliminated: false,
            ghost: false,
            ghost_until: 0,
            forced_ghost: false,
            spawn_tick: 0,
            display_name: sanitize_display_name(display_name),
            next_fire_tick: 0,
            eliminated_tick: None,
            eliminated_by: None,
        }
    }

    /// Not yet eliminated.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.eliminated
    }

    /// Apply one hit. Pure state transition; side effects (relocation,
    /// ghosting, kill credit, freezing) are the caller's job.
    pub fn take_damage(&mut self, amount: u32, attacker: Option<PlayerId>) -> DamageOutcome {
        if !self.authority.is_authority() || self.eliminated || self.ghost {
            return DamageOutcome::Ignored;
        }

        self.health = self.health.saturating_sub(amount);
        if self.health > 0 {
            return DamageOutcome::Damaged;
        }

        self.lives = self.lives.saturating_sub(1);
        if self.lives > 0 {
            self.health = self.max_health;
            return DamageOutcome::Respawned;
        }

        self.eliminated = true;
        self.health = 0;
        let killer = attacker.filter(|a| *a != self.id);
        self.eliminated_by = killer;
        DamageOutcome::Eliminated { killer }
    }

    /// Open a ghost window `[now, now + duration]`.
    pub fn start_ghost(&mut self, now: u32, duration: u32) -> bool {
        if !self.authority.is_authority() || self.eliminated {
            return false;
        }
        self.ghost = true;
        self.spawn_tick = now;
        self.ghost_until = now.saturating_add(duration);
        true
    }

    /// Replace the display name. Returns true if it changed.
    pub fn set_display_name(&mut self, raw: &str) -> bool {
        if !self.authority.is_authority() {
            return false;
        }
        let name = sanitize_display_name(raw);
        if name == self.display_name {
            return false;
        }
        self.display_name = name;
        true
    }

    /// Hash this entity's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_u32(self.health);
        hasher.update_u32(self.max_health);
        hasher.update_u32(self.lives);
        hasher.update_u32(self.kills);
        hasher.update_bool(self.eliminated);
        hasher.update_bool(self.ghost);
        hasher.update_u32(self.ghost_until);
        hasher.update_u32(self.next_fire_tick);
        hasher.update_bytes(self.display_name.as_bytes());
    }

    /// Read-only view for rendering and replication.
    pub fn view(&self, pose: Option<EntityPose>) -> EntityView {
        EntityView {
            id: self.id,
            input_owner: self.input_owner,
            health: self.health,
            max_health: self.max_health,
            lives: self.lives,
            kills: self.kills,
            eliminated: self.eliminated,
            ghost: self.ghost,
            display_name: self.display_name.clone(),
            pose,
        }
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchPhase {
    /// Lobby fill-up; everyone is ghosted
    #[default]
    Waiting,
    /// Active gameplay
    Running,
    /// At most one entity left standing
    Finished,
}

impl MatchPhase {
    fn as_u8(self) -> u8 {
        match self {
            MatchPhase::Waiting => 0,
            MatchPhase::Running => 1,
            MatchPhase::Finished => 2,
        }
    }
}

// =============================================================================
// REPLICATION VIEWS
// =============================================================================

/// Replicated per-entity state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    /// Entity id
    pub id: PlayerId,
    /// Process driving this entity
    pub input_owner: PeerId,
    /// Current health
    pub health: u32,
    /// Health on respawn
    pub max_health: u32,
    /// Remaining lives
    pub lives: u32,
    /// Credited eliminations
    pub kills: u32,
    /// Terminal flag
    pub eliminated: bool,
    /// Ghost flag
    pub ghost: bool,
    /// Sanitized display name
    pub display_name: String,
    /// Pose from the movement collaborator, if it had one
    pub pose: Option<EntityPose>,
}

/// Everything a replica needs after one authoritative tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Tick the snapshot was taken after
    pub tick: u32,
    /// Match phase
    pub phase: MatchPhase,
    /// Entities in id order
    pub entities: Vec<EntityView>,
    /// Projectiles fired this tick, for visual replicas
    pub projectile_spawns: Vec<ProjectileSpawn>,
    /// Wall heights in (cell, axis) order
    pub walls: Vec<WallView>,
    /// Hash of the authoritative state
    pub state_hash: StateHash,
}

// =============================================================================
// ARENA MATCH
// =============================================================================

/// Complete state of a match.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug)]
pub struct ArenaMatch {
    /// Current tick
    pub tick: u32,

    /// Current match phase
    pub phase: MatchPhase,

    /// Whether this process is the match authority
    pub authority: Authority,

    /// Which process runs this instance and which one is authoritative
    pub model: AuthorityModel,

    /// Immutable topology
    pub layout: MazeLayout,

    /// Standing walls
    pub walls: WallSet,

    /// Wall trigger occupancy
    pub proximity: ProximityTracker,

    /// All entities (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, PlayerEntity>,

    /// In-flight projectiles, authority only
    pub projectiles: BTreeMap<u32, Projectile>,

    /// Next projectile ID (monotonic counter)
    pub next_projectile_id: u32,

    /// Most entities present at once
    pub peak_players: usize,

    /// Local spectator viewpoint
    pub spectator: SpectatorCamera,

    spawn_cursor: usize,
    pending_events: Vec<GameEvent>,
    pending_spawns: Vec<ProjectileSpawn>,
}

impl ArenaMatch {
    /// Create a match over a generated layout.
    pub fn new(layout: MazeLayout, model: AuthorityModel, rules: &MatchRules) -> Self {
        let authority = model.local_authority();
        let walls = WallSet::from_layout(&layout, authority, rules.obstacles);
        Self {
            tick: 0,
            phase: MatchPhase::Waiting,
            authority,
            model,
            layout,
            walls,
            proximity: ProximityTracker::new(),
            players: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            next_projectile_id: 0,
            peak_players: 0,
            spectator: SpectatorCamera::new(),
            spawn_cursor: 0,
            pending_events: Vec::new(),
            pending_spawns: Vec::new(),
        }
    }

    /// True on the authority process.
    #[inline]
    pub fn is_authority(&self) -> bool {
        self.authority.is_authority()
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerEntity> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerEntity> {
        self.players.get_mut(id)
    }

    /// Ids of every non-eliminated entity, ascending.
    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.players.values().filter(|p| p.is_alive()).map(|p| p.id).collect()
    }

    /// Count of non-eliminated entities.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// Next spawn point, round-robin. Origin when the layout has none.
    pub fn next_spawn_point(&mut self) -> SpawnPoint {
        let points = &self.layout.spawn_points;
        if points.is_empty() {
            return SpawnPoint::default();
        }
        let point = points[self.spawn_cursor % points.len()];
        self.spawn_cursor = (self.spawn_cursor + 1) % points.len();
        point
    }

    /// Spawn an entity. Authority only; an id already present is ignored.
    pub fn add_player(
        &mut self,
        relay: &mut dyn MovementRelay,
        id: PlayerId,
        display_name: &str,
        input_owner: PeerId,
        rules: &MatchRules,
    ) -> bool {
        if !self.is_authority() || self.players.contains_key(&id) {
            return false;
        }

        let mut player = PlayerEntity::new(
            id,
            self.authority,
            input_owner,
            display_name,
            rules.max_health,
            rules.start_lives,
        );

        let spawn = self.next_spawn_point();
        if !relay.teleport(id, spawn) {
            debug!("No movement body for {}, spawn placement skipped", hex::encode(&id.0[..4]));
        }
        player.start_ghost(self.tick, rules.ghost_ticks);
        player.forced_ghost = self.phase == MatchPhase::Waiting;
        relay.set_ghost(id, true);

        let name = player.display_name.clone();
        self.players.insert(id, player);
        self.peak_players = self.peak_players.max(self.players.len());
        self.push_event(GameEvent::player_joined(self.tick, id, name, spawn.position));
        true
    }

    /// Remove an entity. Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        if !self.is_authority() || self.players.remove(id).is_none() {
            return false;
        }
        let alive = self.alive_ids();
        self.spectator.on_departed(*id, &alive);
        self.push_event(GameEvent::player_left(self.tick, *id));
        true
    }

    /// Register a display name. Authority only, idempotent.
    pub fn register_display_name(&mut self, id: &PlayerId, raw: &str) -> bool {
        if !self.is_authority() {
            return false;
        }
        let tick = self.tick;
        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        if !player.set_display_name(raw) {
            return false;
        }
        let event = GameEvent::display_name_registered(tick, *id, player.display_name.clone());
        self.push_event(event);
        true
    }

    /// Next alive entity after `current` in ascending id order, wrapping.
    pub fn next_alive_after(&self, current: Option<PlayerId>) -> Option<PlayerId> {
        crate::game::spectate::next_alive_after(&self.alive_ids(), current)
    }

    /// Explicitly follow an entity. Local view state, allowed on any process.
    pub fn set_spectate_target(&mut self, id: PlayerId) -> bool {
        match self.players.get(&id) {
            Some(p) if p.is_alive() => {
                self.spectator.set_target(id);
                true
            }
            _ => false,
        }
    }

    /// Step the local camera to the next alive entity, wrapping.
    pub fn cycle_spectate_target(&mut self) -> Option<PlayerId> {
        let alive = self.alive_ids();
        self.spectator.cycle(&alive)
    }

    /// Entity the local camera follows.
    pub fn spectate_target(&self) -> Option<PlayerId> {
        self.spectator.target()
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.layout.seed, |hasher| {
            hasher.update_u8(self.phase.as_u8());

            // Hash all players in sorted order (BTreeMap guarantees this)
            for player in self.players.values() {
                player.hash_into(hasher);
            }

            for (id, projectile) in &self.projectiles {
                hasher.update_u32(*id);
                hasher.update_uuid(&projectile.owner.0);
                hasher.update_vec2(projectile.position);
                hasher.update_vec2(projectile.direction);
                hasher.update_u32(projectile.ttl_ticks);
            }
            hasher.update_u32(self.next_projectile_id);

            for (_, axis) in self.walls.axes() {
                hasher.update_fixed(axis.current_height);
                hasher.update_u32(axis.proximity_count);
            }
        })
    }

    /// Build the replication snapshot for the current tick.
    pub fn snapshot(&self, relay: &dyn MovementRelay, projectile_spawns: Vec<ProjectileSpawn>) -> MatchSnapshot {
        MatchSnapshot {
            tick: self.tick,
            phase: self.phase,
            entities: self.players.values().map(|p| p.view(relay.pose(p.id))).collect(),
            projectile_spawns,
            walls: self.walls.views(),
            state_hash: self.compute_hash(),
        }
    }

    /// Adopt the authority's state on a replica.
    ///
    /// Stale snapshots are dropped and duplicates are harmless. Elimination
    /// side effects run locally the first time an entity is seen eliminated.
    pub fn apply_snapshot(&mut self, relay: &mut dyn MovementRelay, snapshot: &MatchSnapshot) -> bool {
        if self.is_authority() || snapshot.tick < self.tick {
            return false;
        }

        self.tick = snapshot.tick;
        self.phase = snapshot.phase;

        let present: BTreeSet<PlayerId> = snapshot.entities.iter().map(|e| e.id).collect();
        let departed: Vec<PlayerId> = self.players.keys().filter(|id| !present.contains(id)).copied().collect();
        for id in departed {
            self.players.remove(&id);
            let alive = self.alive_ids();
            self.spectator.on_departed(id, &alive);
        }

        let mut newly_eliminated = Vec::new();
        for view in &snapshot.entities {
            let authority = self.authority;
            let entry = self.players.entry(view.id).or_insert_with(|| {
                PlayerEntity::new(view.id, authority, view.input_owner, &view.display_name, view.max_health, view.lives)
            });
            let was_eliminated = entry.eliminated;
            entry.input_owner = view.input_owner;
            entry.health = view.health;
            entry.max_health = view.max_health;
            entry.lives = view.lives;
            entry.kills = view.kills;
            entry.eliminated = view.eliminated;
            entry.ghost = view.ghost;
            entry.display_name = view.display_name.clone();
            if view.eliminated && !was_eliminated {
                entry.eliminated_tick = Some(snapshot.tick);
                newly_eliminated.push(view.id);
            }
        }

        for id in newly_eliminated {
            lifecycle::apply_elimination_effects(self, relay, id);
        }

        self.walls.apply_views(&snapshot.walls);
        true
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Take this tick's projectile spawns.
    pub fn take_spawns(&mut self) -> Vec<ProjectileSpawn> {
        std::mem::take(&mut self.pending_spawns)
    }

    /// Record a projectile spawn for visual replicas.
    pub fn push_spawn(&mut self, spawn: ProjectileSpawn) {
        self.pending_spawns.push(spawn);
    }
}

// =============================================================================
// TESTS
// =============================================================================
