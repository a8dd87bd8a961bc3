//! Damage Resolution
//!
//! Authoritative weapon fire. Two weapon kinds:
//!
//! - **Hitscan**: an aim ray from the eye point behind the vehicle finds what
//!   the driver is looking at, then a verification ray from the muzzle to
//!   that point decides what is actually struck. The second ray keeps shots
//!   from passing through cover the muzzle can't see past.
//! - **Projectile**: synthetic projectiles advance each tick by
//!   `direction * speed * dt`, sweeping a circle of `projectile_radius` over
//!   the travelled segment.
//!
//! Resolution only collects [`PendingHit`]s; lifecycle applies them.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

use crate::core::fixed::{Fixed, FIXED_ONE, TICK_DURATION, to_fixed, fixed_mul};
use crate::core::vec2::FixedVec2;
use crate::game::collision::{CollisionScene, HitTarget};
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::movement::EntityPose;
use crate::game::state::{ArenaMatch, PlayerId};

/// Extra reach on the muzzle ray so rounding never stops it just short of
/// the aim point.
const HITSCAN_SLACK: Fixed = FIXED_ONE / 16;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// How a weapon resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Instant ray
    Hitscan,
    /// Travelling projectile
    Projectile,
}

/// Weapon settings in world units and ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Resolution mode
    pub kind: WeaponKind,
    /// Health removed per hit
    pub damage: u32,
    /// Minimum ticks between shots
    pub fire_interval_ticks: u32,
    /// Hitscan reach
    pub range: f64,
    /// Projectile speed (units/s)
    pub projectile_speed: f64,
    /// Projectile sweep radius
    pub projectile_radius: f64,
    /// Projectile lifetime
    pub projectile_ttl_ticks: u32,
    /// Muzzle distance ahead of the vehicle center
    pub muzzle_offset: f64,
    /// Eye distance behind the vehicle center
    pub eye_offset: f64,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            kind: WeaponKind::Projectile,
            damage: 10,
            fire_interval_ticks: 6,
            range: 200.0,
            projectile_speed: 35.0,
            projectile_radius: 0.1,
            projectile_ttl_ticks: 150,
            muzzle_offset: 2.0,
            eye_offset: 4.0,
        }
    }
}

impl WeaponConfig {
    /// Convert to fixed-point rules for the tick.
    pub fn compile(&self) -> WeaponRules {
        WeaponRules {
            kind: self.kind,
            damage: self.damage,
            fire_interval_ticks: self.fire_interval_ticks,
            range: to_fixed(self.range),
            projectile_speed: to_fixed(self.projectile_speed),
            projectile_radius: to_fixed(self.projectile_radius),
            projectile_ttl_ticks: self.projectile_ttl_ticks,
            muzzle_offset: to_fixed(self.muzzle_offset),
            eye_offset: to_fixed(self.eye_offset),
        }
    }
}

/// Fixed-point weapon parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeaponRules {
    /// Resolution mode
    pub kind: WeaponKind,
    /// Health removed per hit
    pub damage: u32,
    /// Minimum ticks between shots
    pub fire_interval_ticks: u32,
    /// Hitscan reach
    pub range: Fixed,
    /// Projectile speed (units/s)
    pub projectile_speed: Fixed,
    /// Projectile sweep radius
    pub projectile_radius: Fixed,
    /// Projectile lifetime
    pub projectile_ttl_ticks: u32,
    /// Muzzle distance ahead of the vehicle center
    pub muzzle_offset: Fixed,
    /// Eye distance behind the vehicle center
    pub eye_offset: Fixed,
}

// =============================================================================
// PROJECTILES
// =============================================================================

/// An authority-only projectile. Never replicated directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Monotonic id
    pub id: u32,
    /// Firing entity, never damaged by its own projectile
    pub owner: PlayerId,
    /// Current center
    pub position: FixedVec2,
    /// Unit travel direction
    pub direction: FixedVec2,
    /// Units per second
    pub speed: Fixed,
    /// Ticks left before silent removal
    pub ttl_ticks: u32,
}

/// Spawn notice broadcast once for visual replicas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    /// Projectile id
    pub projectile_id: u32,
    /// Firing entity
    pub owner: PlayerId,
    /// Start position
    pub position: FixedVec2,
    /// Unit direction
    pub direction: FixedVec2,
}

// =============================================================================
// HITS
// =============================================================================

/// What produced a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitSource {
    /// Instant ray
    Hitscan,
    /// Projectile by id
    Projectile(u32),
}

/// A hit waiting to be applied by the lifecycle step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingHit {
    /// Struck entity
    pub victim: PlayerId,
    /// Firing entity
    pub attacker: Option<PlayerId>,
    /// Health to remove
    pub amount: u32,
    /// Origin of the hit
    pub source: HitSource,
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Build the tick's read-only collision world: perimeter, every blocking
/// wall, and every tangible (alive, not ghosted) vehicle with a pose.
pub fn build_scene(
    arena: &ArenaMatch,
    poses: &BTreeMap<PlayerId, EntityPose>,
    vehicle_radius: Fixed,
) -> CollisionScene {
    let mut scene = CollisionScene::new();
    for bounds in &arena.layout.perimeter {
        scene.add_wall(*bounds);
    }
    for (_, bounds) in arena.walls.blocking_bounds() {
        scene.add_wall(bounds);
    }
    for player in arena.players.values() {
        if player.eliminated || player.ghost {
            continue;
        }
        if let Some(pose) = poses.get(&player.id) {
            scene.add_entity(player.id, pose.position, vehicle_radius);
        }
    }
    scene
}

/// Resolve one hitscan shot. Returns the entity struck, if any.
pub fn resolve_hitscan(
    scene: &CollisionScene,
    position: FixedVec2,
    aim: FixedVec2,
    shooter: PlayerId,
    weapon: &WeaponRules,
) -> Option<PlayerId> {
    // 1. Aim ray from the eye
    let eye = position - aim.scale(weapon.eye_offset);
    let muzzle = position + aim.scale(weapon.muzzle_offset);
    let forward = eye + aim.scale(weapon.range);
    let aim_point = match scene.trace(eye, aim, weapon.range, 0, Some(shooter)) {
        // The eye sits behind the vehicle; a hit there is not a target
        Some(hit) if (hit.point - muzzle).dot(aim) > 0 => hit.point,
        _ => forward,
    };

    // 2. Verification ray from the muzzle to the aim point
    let distance = muzzle.distance(aim_point);
    let dir = (aim_point - muzzle).normalize();
    if dir == FixedVec2::ZERO {
        return None;
    }
    let hit = scene.trace(muzzle, dir, distance.saturating_add(HITSCAN_SLACK), 0, Some(shooter))?;
    match hit.target {
        HitTarget::Entity(victim) => Some(victim),
        HitTarget::Wall(_) => None,
    }
}

/// Process fire intents for this tick in ascending shooter id.
///
/// Eliminated entities never fire. Intents before an entity's gate are
/// dropped. Hitscan hits are returned; projectiles are spawned into the
/// match and resolve in [`step_projectiles`].
pub fn fire_weapons(
    arena: &mut ArenaMatch,
    scene: &CollisionScene,
    poses: &BTreeMap<PlayerId, EntityPose>,
    inputs: &BTreeMap<PlayerId, InputFrame>,
    weapon: &WeaponRules,
    max_projectiles: usize,
) -> Vec<PendingHit> {
    let tick = arena.tick;
    let mut hits = Vec::new();

    for (id, input) in inputs {
        if !input.fire_pressed() {
            continue;
        }
        let Some(player) = arena.players.get_mut(id) else {
            continue;
        };
        if player.eliminated {
            continue;
        }
        if tick < player.next_fire_tick {
            trace!("Fire intent from {} dropped until tick {}", hex::encode(&id.0[..4]), player.next_fire_tick);
            continue;
        }
        let Some(pose) = poses.get(id) else {
            debug!("No pose for {}, shot skipped", hex::encode(&id.0[..4]));
            continue;
        };
        let aim = input.aim_direction().unwrap_or(pose.heading);
        if aim == FixedVec2::ZERO {
            continue;
        }
        player.next_fire_tick = tick.saturating_add(weapon.fire_interval_ticks);

        match weapon.kind {
            WeaponKind::Hitscan => {
                if let Some(victim) = resolve_hitscan(scene, pose.position, aim, *id, weapon) {
                    hits.push(PendingHit {
                        victim,
                        attacker: Some(*id),
                        amount: weapon.damage,
                        source: HitSource::Hitscan,
                    });
                }
            }
            WeaponKind::Projectile => {
                let muzzle = pose.position + aim.scale(weapon.muzzle_offset);
                spawn_projectile(arena, *id, muzzle, aim, weapon, max_projectiles);
            }
        }
    }

    hits
}

/// Add a projectile, dropping the oldest when the list is full.
pub fn spawn_projectile(
    arena: &mut ArenaMatch,
    owner: PlayerId,
    position: FixedVec2,
    direction: FixedVec2,
    weapon: &WeaponRules,
    max_projectiles: usize,
) -> u32 {
    let id = arena.next_projectile_id;
    arena.next_projectile_id = arena.next_projectile_id.wrapping_add(1);

    while arena.projectiles.len() >= max_projectiles.max(1) {
        if let Some((dropped, _)) = arena.projectiles.pop_first() {
            trace!("Projectile {} dropped, list full", dropped);
        }
    }
    arena.projectiles.insert(id, Projectile {
        id,
        owner,
        position,
        direction,
        speed: weapon.projectile_speed,
        ttl_ticks: weapon.projectile_ttl_ticks,
    });

    arena.push_spawn(ProjectileSpawn { projectile_id: id, owner, position, direction });
    let tick = arena.tick;
    arena.push_event(GameEvent::projectile_spawned(tick, id, owner, position, direction));
    id
}

/// Advance every projectile one tick in ascending id order.
///
/// A projectile that touches anything is removed; if it was a vehicle the
/// hit is returned. Expired projectiles are removed silently.
pub fn step_projectiles(
    projectiles: &mut BTreeMap<u32, Projectile>,
    scene: &CollisionScene,
    weapon: &WeaponRules,
) -> Vec<PendingHit> {
    let mut hits = Vec::new();
    let mut finished = Vec::new();

    for (id, projectile) in projectiles.iter_mut() {
        let travel = fixed_mul(projectile.speed, TICK_DURATION);
        let contact = scene.trace(
            projectile.position,
            projectile.direction,
            travel,
            weapon.projectile_radius,
            Some(projectile.owner),
        );

        match contact {
            Some(hit) => {
                if let HitTarget::Entity(victim) = hit.target {
                    hits.push(PendingHit {
                        victim,
                        attacker: Some(projectile.owner),
                        amount: weapon.damage,
                        source: HitSource::Projectile(*id),
                    });
                }
                finished.push(*id);
            }
            None => {
                projectile.position = projectile.position + projectile.direction.scale(travel);
                projectile.ttl_ticks = projectile.ttl_ticks.saturating_sub(1);
                if projectile.ttl_ticks == 0 {
                    finished.push(*id);
                }
            }
        }
    }

    for id in finished {
        projectiles.remove(&id);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::from_int;
    use crate::game::collision::Aabb;

    fn weapon() -> WeaponRules {
        WeaponConfig::default().compile()
    }

    fn projectile(owner: PlayerId) -> Projectile {
        Projectile {
            id: 0,
            owner,
            position: FixedVec2::ZERO,
            direction: FixedVec2::RIGHT,
            speed: weapon().projectile_speed,
            ttl_ticks: weapon().projectile_ttl_ticks,
        }
    }

    #[test]
    fn test_projectile_expires_in_open_space() {
        let owner = PlayerId::new([1; 16]);
        let scene = CollisionScene::new();
        let mut projectiles = BTreeMap::new();
        projectiles.insert(0, projectile(owner));

        let mut ticks = 0;
        while !projectiles.is_empty() {
            let hits = step_projectiles(&mut projectiles, &scene, &weapon());
            assert!(hits.is_empty());
            ticks += 1;
            assert!(ticks <= 150, "projectile outlived its ttl");
        }
        // 2.5 s at 60 Hz
        assert_eq!(ticks, 150);
    }

    #[test]
    fn test_projectile_travel_distance() {
        let owner = PlayerId::new([1; 16]);
        let scene = CollisionScene::new();
        let mut projectiles = BTreeMap::new();
        projectiles.insert(0, projectile(owner));
        for _ in 0..60 {
            step_projectiles(&mut projectiles, &scene, &weapon());
        }
        // ~35 units after one second
        let x = projectiles[&0].position.x;
        assert!((x - from_int(35)).abs() < FIXED_ONE / 2, "x = {}", x);
    }

    #[test]
    fn test_projectile_hits_entity_not_owner() {
        let owner = PlayerId::new([1; 16]);
        let victim = PlayerId::new([2; 16]);
        let mut scene = CollisionScene::new();
        scene.add_entity(owner, FixedVec2::ZERO, from_int(1));
        scene.add_entity(victim, FixedVec2::from_ints(5, 0), from_int(1));

        let mut projectiles = BTreeMap::new();
        projectiles.insert(0, projectile(owner));

        let mut hits = Vec::new();
        for _ in 0..20 {
            hits.extend(step_projectiles(&mut projectiles, &scene, &weapon()));
        }
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].victim, victim);
        assert_eq!(hits[0].attacker, Some(owner));
        assert_eq!(hits[0].source, HitSource::Projectile(0));
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_projectile_stopped_by_wall() {
        let owner = PlayerId::new([1; 16]);
        let victim = PlayerId::new([2; 16]);
        let mut scene = CollisionScene::new();
        scene.add_wall(Aabb::from_center(FixedVec2::from_ints(3, 0), FIXED_ONE / 2, from_int(5)));
        scene.add_entity(victim, FixedVec2::from_ints(6, 0), from_int(1));

        let mut projectiles = BTreeMap::new();
        projectiles.insert(0, projectile(owner));
        let mut hits = Vec::new();
        for _ in 0..20 {
            hits.extend(step_projectiles(&mut projectiles, &scene, &weapon()));
        }
        assert!(hits.is_empty());
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_hitscan_hits_first_entity() {
        let shooter = PlayerId::new([1; 16]);
        let near = PlayerId::new([2; 16]);
        let far = PlayerId::new([3; 16]);
        let mut scene = CollisionScene::new();
        scene.add_entity(shooter, FixedVec2::ZERO, from_int(1));
        scene.add_entity(near, FixedVec2::from_ints(10, 0), from_int(1));
        scene.add_entity(far, FixedVec2::from_ints(20, 0), from_int(1));

        let victim = resolve_hitscan(&scene, FixedVec2::ZERO, FixedVec2::RIGHT, shooter, &weapon());
        assert_eq!(victim, Some(near));
    }

    #[test]
    fn test_hitscan_blocked_by_wall() {
        let shooter = PlayerId::new([1; 16]);
        let target = PlayerId::new([2; 16]);
        let mut scene = CollisionScene::new();
        scene.add_wall(Aabb::from_center(FixedVec2::from_ints(5, 0), FIXED_ONE, from_int(4)));
        scene.add_entity(target, FixedVec2::from_ints(10, 0), from_int(1));

        let victim = resolve_hitscan(&scene, FixedVec2::ZERO, FixedVec2::RIGHT, shooter, &weapon());
        assert_eq!(victim, None);
    }

    #[test]
    fn test_hitscan_ignores_wall_behind_shooter() {
        let shooter = PlayerId::new([1; 16]);
        let target = PlayerId::new([2; 16]);
        let mut scene = CollisionScene::new();
        scene.add_entity(shooter, FixedVec2::ZERO, from_int(1));
        // Encloses the eye point four units behind the vehicle
        scene.add_wall(Aabb::from_center(FixedVec2::from_ints(-4, 0), FIXED_ONE, FIXED_ONE));
        scene.add_entity(target, FixedVec2::from_ints(10, 0), from_int(1));

        let victim = resolve_hitscan(&scene, FixedVec2::ZERO, FixedVec2::RIGHT, shooter, &weapon());
        assert_eq!(victim, Some(target));
    }

    #[test]
    fn test_hitscan_ignores_entity_behind_shooter() {
        let shooter = PlayerId::new([1; 16]);
        let behind = PlayerId::new([2; 16]);
        let ahead = PlayerId::new([3; 16]);
        let mut scene = CollisionScene::new();
        scene.add_entity(shooter, FixedVec2::ZERO, from_int(1));
        scene.add_entity(behind, FixedVec2::from_ints(-4, 0), from_int(1));
        scene.add_entity(ahead, FixedVec2::from_ints(10, 0), from_int(1));

        let victim = resolve_hitscan(&scene, FixedVec2::ZERO, FixedVec2::RIGHT, shooter, &weapon());
        assert_eq!(victim, Some(ahead));
    }

    #[test]
    fn test_hitscan_out_of_range() {
        let shooter = PlayerId::new([1; 16]);
        let target = PlayerId::new([2; 16]);
        let mut scene = CollisionScene::new();
        scene.add_entity(target, FixedVec2::from_ints(300, 0), from_int(1));
        let victim = resolve_hitscan(&scene, FixedVec2::ZERO, FixedVec2::RIGHT, shooter, &weapon());
        assert_eq!(victim, None);
    }
}
