//! Entity Lifecycle
//!
//! Side effects of lifecycle transitions. The transitions themselves live on
//! [`PlayerEntity`](crate::game::state::PlayerEntity); this module relocates,
//! ghosts, freezes and credits, then records events.
//!
//! ```text
//!            hit, lives left            hit, last life
//!   Alive ───────────────────> Alive ─────────────────> Eliminated
//!   (ghost on spawn)          (respawned, ghosted)      (frozen, hidden)
//! ```

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::core::vec2::FixedVec2;
use crate::game::collision::overlapping_bodies;
use crate::game::damage::PendingHit;
use crate::game::events::GameEvent;
use crate::game::movement::{EntityPose, MovementRelay};
use crate::game::state::{ArenaMatch, DamageOutcome, MatchPhase, PlayerId};
use crate::game::tick::MatchRules;

fn short(id: &PlayerId) -> String {
    hex::encode(&id.0[..4])
}

/// Apply one hit to `victim` and run every side effect of the outcome.
///
/// Silent no-op on replicas, for unknown ids, and for eliminated or ghosted
/// victims, so duplicate delivery is harmless.
pub fn apply_damage(
    arena: &mut ArenaMatch,
    relay: &mut dyn MovementRelay,
    victim: PlayerId,
    amount: u32,
    attacker: Option<PlayerId>,
    rules: &MatchRules,
) -> DamageOutcome {
    if !arena.is_authority() {
        return DamageOutcome::Ignored;
    }
    let tick = arena.tick;
    let Some(player) = arena.players.get_mut(&victim) else {
        return DamageOutcome::Ignored;
    };

    let outcome = player.take_damage(amount, attacker);
    let health = player.health;
    let lives = player.lives;

    match outcome {
        DamageOutcome::Ignored => DamageOutcome::Ignored,

        DamageOutcome::Damaged => {
            arena.push_event(GameEvent::damage_applied(tick, victim, attacker, amount, health));
            DamageOutcome::Damaged
        }

        DamageOutcome::Respawned => {
            arena.push_event(GameEvent::damage_applied(tick, victim, attacker, amount, 0));

            let spawn = arena.next_spawn_point();
            if !relay.teleport(victim, spawn) {
                debug!("No movement body for {}, respawn placement skipped", short(&victim));
            }
            if let Some(player) = arena.players.get_mut(&victim) {
                player.start_ghost(tick, rules.ghost_ticks);
            }
            relay.set_ghost(victim, true);

            info!("{} respawned, {} lives left", short(&victim), lives);
            arena.push_event(GameEvent::respawned(tick, victim, lives, spawn.position));
            DamageOutcome::Respawned
        }

        DamageOutcome::Eliminated { killer } => {
            // Credit only an attacker still in the match
            let killer = killer.filter(|k| arena.players.contains_key(k));
            if let Some(player) = arena.players.get_mut(&victim) {
                player.eliminated_tick = Some(tick);
                player.eliminated_by = killer;
            }

            arena.push_event(GameEvent::damage_applied(tick, victim, attacker, amount, 0));
            arena.push_event(GameEvent::player_eliminated(tick, victim, killer));

            if let Some(killer_id) = killer {
                if let Some(k) = arena.players.get_mut(&killer_id) {
                    k.kills += 1;
                    let kills = k.kills;
                    info!("{} eliminated by {} ({} kills)", short(&victim), short(&killer_id), kills);
                    arena.push_event(GameEvent::kill_credited(tick, killer_id, victim, kills));
                }
            } else {
                info!("{} eliminated", short(&victim));
            }

            apply_elimination_effects(arena, relay, victim);
            DamageOutcome::Eliminated { killer }
        }
    }
}

/// Apply hits in the given order. Later hits on an entity eliminated by an
/// earlier one are no-ops.
pub fn apply_hits(
    arena: &mut ArenaMatch,
    relay: &mut dyn MovementRelay,
    hits: &[PendingHit],
    rules: &MatchRules,
) -> Vec<DamageOutcome> {
    hits.iter()
        .map(|hit| apply_damage(arena, relay, hit.victim, hit.amount, hit.attacker, rules))
        .collect()
}

/// Freeze, hide and de-collide an eliminated entity, then hand the
/// spectator camera off. Runs on the authority and on replicas; every step
/// is idempotent.
pub fn apply_elimination_effects(arena: &mut ArenaMatch, relay: &mut dyn MovementRelay, victim: PlayerId) {
    let frozen = relay.set_simulated(victim, false);
    let decollided = relay.set_collision_enabled(victim, false);
    let hidden = relay.set_visible(victim, false);
    if !(frozen && decollided && hidden) {
        debug!("No movement body for {}, elimination effects skipped", short(&victim));
    }

    let local = arena
        .players
        .get(&victim)
        .is_some_and(|p| arena.model.is_local(p.input_owner));
    let alive = arena.alive_ids();
    arena.spectator.on_eliminated(victim, local, &alive);
}

/// Renew or end ghost windows.
///
/// A ghost overlapping any other non-eliminated entity has its window pushed
/// to `now + ghost_ticks`; otherwise it turns solid once the window passes.
/// Forced ghosts (waiting room) are left alone. Checks every pair of live
/// entities.
pub fn refresh_ghosts(
    arena: &mut ArenaMatch,
    relay: &mut dyn MovementRelay,
    poses: &BTreeMap<PlayerId, EntityPose>,
    rules: &MatchRules,
) {
    if !arena.is_authority() {
        return;
    }

    let bodies: Vec<(PlayerId, FixedVec2)> = arena
        .players
        .values()
        .filter(|p| p.is_alive())
        .filter_map(|p| poses.get(&p.id).map(|pose| (p.id, pose.position)))
        .collect();
    let overlapping = overlapping_bodies(&bodies, rules.vehicle_radius);

    let tick = arena.tick;
    let mut solid = Vec::new();
    for player in arena.players.values_mut() {
        if !player.ghost || player.eliminated || player.forced_ghost {
            continue;
        }
        if overlapping.contains(&player.id) {
            player.ghost_until = player.ghost_until.max(tick.saturating_add(rules.ghost_ticks));
        } else if tick >= player.ghost_until {
            player.ghost = false;
            solid.push(player.id);
        }
    }

    for id in solid {
        relay.set_ghost(id, false);
    }
}

/// Advance `Waiting -> Running -> Finished`. Returns the new phase and
/// winner when the match ended this call.
pub fn update_phase(arena: &mut ArenaMatch, rules: &MatchRules) -> Option<Option<PlayerId>> {
    if !arena.is_authority() {
        return None;
    }
    let tick = arena.tick;

    match arena.phase {
        MatchPhase::Waiting => {
            if arena.players.len() >= rules.required_players {
                arena.phase = MatchPhase::Running;
                for player in arena.players.values_mut() {
                    player.forced_ghost = false;
                }
                info!("Match running with {} players", arena.players.len());
                arena.push_event(GameEvent::phase_changed(tick, MatchPhase::Waiting, MatchPhase::Running));
            }
            None
        }
        MatchPhase::Running => {
            if arena.peak_players > 1 && arena.alive_count() <= 1 {
                let winner = arena.alive_ids().first().copied();
                arena.phase = MatchPhase::Finished;
                info!("Match finished at tick {}, winner {:?}", tick, winner.map(|w| short(&w)));
                arena.push_event(GameEvent::phase_changed(tick, MatchPhase::Running, MatchPhase::Finished));
                arena.push_event(GameEvent::match_ended(tick, winner));
                Some(winner)
            } else {
                None
            }
        }
        MatchPhase::Finished => None,
    }
}
