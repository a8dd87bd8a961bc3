//! Projectile Visuals
//!
//! Replica-side cosmetic projectiles. Spawned from the spawn records carried
//! in snapshots, advanced with the same sweep the authority uses, and
//! discarded on contact or expiry. Nothing here writes match state: the
//! authoritative damage already happened on the host.

use std::collections::BTreeMap;

use crate::core::fixed::{fixed_mul, TICK_DURATION};
use crate::core::vec2::FixedVec2;
use crate::game::collision::CollisionScene;
use crate::game::damage::{ProjectileSpawn, WeaponRules};

/// A purely visual projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectileVisual {
    /// Spawn record this visual was created from
    pub spawn: ProjectileSpawn,
    /// Current position
    pub position: FixedVec2,
    /// Remaining ticks
    pub ttl_ticks: u32,
    /// Where it struck something, if it did
    pub impact: Option<FixedVec2>,
}

impl ProjectileVisual {
    /// Create a visual at the muzzle.
    pub fn from_spawn(spawn: ProjectileSpawn, weapon: &WeaponRules) -> Self {
        Self {
            spawn,
            position: spawn.position,
            ttl_ticks: weapon.projectile_ttl_ticks,
            impact: None,
        }
    }

    /// True once the visual hit something or expired.
    pub fn is_finished(&self) -> bool {
        self.impact.is_some() || self.ttl_ticks == 0
    }

    /// Advance one tick. Returns `false` once finished.
    pub fn advance(&mut self, scene: &CollisionScene, weapon: &WeaponRules) -> bool {
        if self.is_finished() {
            return false;
        }
        let travel = fixed_mul(weapon.projectile_speed, TICK_DURATION);
        let contact = scene.trace(
            self.position,
            self.spawn.direction,
            travel,
            weapon.projectile_radius,
            Some(self.spawn.owner),
        );
        match contact {
            Some(hit) => {
                self.position = hit.point;
                self.impact = Some(hit.point);
                false
            }
            None => {
                self.position = self.position + self.spawn.direction.scale(travel);
                self.ttl_ticks = self.ttl_ticks.saturating_sub(1);
                self.ttl_ticks > 0
            }
        }
    }
}

/// Visual projectiles keyed by the authority's projectile id.
#[derive(Clone, Debug, Default)]
pub struct VisualProjectiles {
    active: BTreeMap<u32, ProjectileVisual>,
    /// One past the highest id ever spawned; the authority issues ids in
    /// ascending order
    next_id: u32,
}

impl VisualProjectiles {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start visuals for newly announced projectiles. Ids seen before are
    /// ignored, including ones whose visual already finished, so a
    /// redelivered snapshot never double-spawns.
    pub fn spawn_all(&mut self, spawns: &[ProjectileSpawn], weapon: &WeaponRules) {
        let floor = self.next_id;
        for spawn in spawns {
            if spawn.projectile_id < floor {
                continue;
            }
            self.active
                .entry(spawn.projectile_id)
                .or_insert_with(|| ProjectileVisual::from_spawn(*spawn, weapon));
            self.next_id = self.next_id.max(spawn.projectile_id.saturating_add(1));
        }
    }

    /// Advance every visual and drop finished ones. Returns impact points
    /// produced this tick.
    pub fn advance_all(&mut self, scene: &CollisionScene, weapon: &WeaponRules) -> Vec<FixedVec2> {
        let mut impacts = Vec::new();
        self.active.retain(|_, visual| {
            let alive = visual.advance(scene, weapon);
            if let Some(point) = visual.impact {
                impacts.push(point);
            }
            alive
        });
        impacts
    }

    /// Live visual by projectile id.
    pub fn get(&self, id: u32) -> Option<&ProjectileVisual> {
        self.active.get(&id)
    }

    /// Number of live visuals.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
