//! Collision Detection
//!
//! Deterministic overlap tests and swept traces on the ground plane.
//! Walls are axis-aligned boxes, vehicles are circles. A trace sweeps a circle
//! of `radius` along a unit direction and reports the first thing it touches.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, Wide, FIXED_SCALE, wide_mul, wide_div, wide_sqrt};
use crate::core::vec2::FixedVec2;
use crate::game::state::PlayerId;

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(
    pos_a: FixedVec2,
    radius_a: Fixed,
    pos_b: FixedVec2,
    radius_b: Fixed,
) -> bool {
    let combined_radius = radius_a.saturating_add(radius_b);
    let combined_radius_sq = wide_mul(combined_radius, combined_radius);
    pos_a.distance_squared(pos_b) <= combined_radius_sq
}

// =============================================================================
// AXIS-ALIGNED BOXES
// =============================================================================

/// Axis-aligned box on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: FixedVec2,
    /// Maximum corner
    pub max: FixedVec2,
}

impl Aabb {
    /// Box from a center point and half extents.
    pub fn from_center(center: FixedVec2, half_x: Fixed, half_z: Fixed) -> Self {
        Self {
            min: FixedVec2::new(center.x - half_x, center.z - half_z),
            max: FixedVec2::new(center.x + half_x, center.z + half_z),
        }
    }

    /// Grow the box by `margin` on every side.
    pub fn inflate(self, margin: Fixed) -> Self {
        Self {
            min: FixedVec2::new(self.min.x - margin, self.min.z - margin),
            max: FixedVec2::new(self.max.x + margin, self.max.z + margin),
        }
    }

    /// Center point.
    pub fn center(&self) -> FixedVec2 {
        FixedVec2::new(
            self.min.x + ((self.max.x - self.min.x) >> 1),
            self.min.z + ((self.max.z - self.min.z) >> 1),
        )
    }

    /// True if the point lies inside or on the boundary.
    pub fn contains(&self, point: FixedVec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// True if a circle touches the box.
    pub fn overlaps_circle(&self, center: FixedVec2, radius: Fixed) -> bool {
        let closest = FixedVec2::new(
            center.x.clamp(self.min.x, self.max.x),
            center.z.clamp(self.min.z, self.max.z),
        );
        center.distance_squared(closest) <= wide_mul(radius, radius)
    }
}

// =============================================================================
// TRACES
// =============================================================================

/// What a trace struck.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HitTarget {
    /// Blocking geometry, by index into the scene's wall list.
    Wall(usize),
    /// A tangible vehicle.
    Entity(PlayerId),
}

/// First contact of a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayHit {
    /// Distance travelled along the direction before contact
    pub distance: Fixed,
    /// Position of the swept circle's center at contact
    pub point: FixedVec2,
    /// What was hit
    pub target: HitTarget,
}

/// Distance along `dir` at which a swept circle first touches a target
/// circle of combined radius `radius`. Zero if the origin starts inside.
fn trace_circle(
    origin: FixedVec2,
    dir: FixedVec2,
    max_distance: Fixed,
    center: FixedVec2,
    radius: Fixed,
) -> Option<Wide> {
    let rel = center - origin;
    let len_sq = rel.length_squared();
    let radius_sq = wide_mul(radius, radius);
    if len_sq <= radius_sq {
        return Some(0);
    }

    let proj = rel.dot(dir);
    if proj < 0 {
        return None;
    }

    let perp_sq = len_sq - ((proj * proj) >> FIXED_SCALE);
    if perp_sq > radius_sq {
        return None;
    }

    let half_chord = wide_sqrt(radius_sq - perp_sq) as Wide;
    let t = (proj - half_chord).max(0);
    if t > max_distance as Wide {
        return None;
    }
    Some(t)
}

/// Slab test of a ray against a box (already inflated by the sweep radius).
fn trace_aabb(origin: FixedVec2, dir: FixedVec2, max_distance: Fixed, bounds: &Aabb) -> Option<Wide> {
    let mut enter = Wide::MIN;
    let mut exit = Wide::MAX;

    for (o, d, lo, hi) in [
        (origin.x, dir.x, bounds.min.x, bounds.max.x),
        (origin.z, dir.z, bounds.min.z, bounds.max.z),
    ] {
        match (wide_div(lo - o, d), wide_div(hi - o, d)) {
            (Some(t1), Some(t2)) => {
                enter = enter.max(t1.min(t2));
                exit = exit.min(t1.max(t2));
            }
            _ => {
                // Parallel to this slab: inside it or never touching
                if o < lo || o > hi {
                    return None;
                }
            }
        }
    }

    if enter > exit || exit < 0 {
        return None;
    }
    let t = enter.max(0);
    if t > max_distance as Wide {
        return None;
    }
    Some(t)
}

// =============================================================================
// COLLISION SCENE
// =============================================================================

/// Read-only snapshot of everything a trace can hit during one tick.
///
/// Built once per tick from the tick's pose snapshot so every query in the
/// tick sees the same world.
#[derive(Clone, Debug, Default)]
pub struct CollisionScene {
    walls: Vec<Aabb>,
    entities: Vec<(PlayerId, FixedVec2, Fixed)>,
}

impl CollisionScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blocking wall. Returns its index for `HitTarget::Wall`.
    pub fn add_wall(&mut self, bounds: Aabb) -> usize {
        self.walls.push(bounds);
        self.walls.len() - 1
    }

    /// Add a tangible vehicle.
    pub fn add_entity(&mut self, id: PlayerId, position: FixedVec2, radius: Fixed) {
        self.entities.push((id, position, radius));
    }

    /// Number of blocking walls.
    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    /// Number of tangible vehicles.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Sweep a circle of `radius` from `origin` along unit `dir`.
    ///
    /// `ignore` excludes one entity (the firer or projectile owner).
    /// Equal distances resolve walls first, then entities in insertion order.
    pub fn trace(
        &self,
        origin: FixedVec2,
        dir: FixedVec2,
        max_distance: Fixed,
        radius: Fixed,
        ignore: Option<PlayerId>,
    ) -> Option<RayHit> {
        let mut best: Option<(Wide, HitTarget)> = None;

        for (index, wall) in self.walls.iter().enumerate() {
            if let Some(t) = trace_aabb(origin, dir, max_distance, &wall.inflate(radius)) {
                if best.is_none_or(|(bt, _)| t < bt) {
                    best = Some((t, HitTarget::Wall(index)));
                }
            }
        }

        for (id, center, body_radius) in &self.entities {
            if ignore == Some(*id) {
                continue;
            }
            let combined = body_radius.saturating_add(radius);
            if let Some(t) = trace_circle(origin, dir, max_distance, *center, combined) {
                if best.is_none_or(|(bt, _)| t < bt) {
                    best = Some((t, HitTarget::Entity(*id)));
                }
            }
        }

        best.map(|(t, target)| {
            let distance = t as Fixed;
            RayHit {
                distance,
                point: origin + dir.scale(distance),
                target,
            }
        })
    }
}

/// Ids of every body that overlaps at least one other body.
///
/// Checks all pairs (i, j) with i < j, so cost grows quadratically with
/// the number of bodies.
pub fn overlapping_bodies(bodies: &[(PlayerId, FixedVec2)], radius: Fixed) -> BTreeSet<PlayerId> {
    let mut overlapping = BTreeSet::new();
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (id_a, pos_a) = bodies[i];
            let (id_b, pos_b) = bodies[j];
            if circles_overlap(pos_a, radius, pos_b, radius) {
                overlapping.insert(id_a);
                overlapping.insert(id_b);
            }
        }
    }
    overlapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, FIXED_ONE};

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    #[test]
    fn test_circles_overlap() {
        let pos_a = FixedVec2::new(0, 0);
        let pos_b = FixedVec2::new(to_fixed(1.0), 0);
        let radius = to_fixed(0.6);

        assert!(circles_overlap(pos_a, radius, pos_b, radius));

        let pos_c = FixedVec2::new(to_fixed(2.0), 0);
        assert!(!circles_overlap(pos_a, radius, pos_c, radius));
    }

    #[test]
    fn test_aabb_overlaps_circle() {
        let wall = Aabb::from_center(FixedVec2::ZERO, to_fixed(1.5), to_fixed(7.5));
        assert!(wall.overlaps_circle(FixedVec2::from_ints(2, 0), FIXED_ONE));
        assert!(!wall.overlaps_circle(FixedVec2::from_ints(3, 0), FIXED_ONE));
        assert!(wall.contains(FixedVec2::from_ints(1, 7)));
        assert_eq!(wall.center(), FixedVec2::ZERO);
    }

    #[test]
    fn test_trace_hits_entity_in_front() {
        let mut scene = CollisionScene::new();
        scene.add_entity(id(2), FixedVec2::from_ints(10, 0), FIXED_ONE);

        let hit = scene
            .trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, None)
            .map(|h| (h.target, h.distance));
        assert_eq!(hit, Some((HitTarget::Entity(id(2)), to_fixed(9.0))));

        // Behind the origin
        let miss = scene.trace(FixedVec2::ZERO, -FixedVec2::RIGHT, to_fixed(50.0), 0, None);
        assert!(miss.is_none());

        // Out of range
        let short = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(5.0), 0, None);
        assert!(short.is_none());
    }

    #[test]
    fn test_trace_ignores_excluded_entity() {
        let mut scene = CollisionScene::new();
        scene.add_entity(id(1), FixedVec2::ZERO, FIXED_ONE);
        scene.add_entity(id(2), FixedVec2::from_ints(10, 0), FIXED_ONE);

        let hit = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, Some(id(1)));
        assert_eq!(hit.map(|h| h.target), Some(HitTarget::Entity(id(2))));

        // Without the exclusion the trace starts inside the firer
        let own = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, None);
        assert_eq!(own.map(|h| h.distance), Some(0));
    }

    #[test]
    fn test_wall_blocks_entity_behind_it() {
        let mut scene = CollisionScene::new();
        let wall = scene.add_wall(Aabb::from_center(FixedVec2::from_ints(5, 0), FIXED_ONE, to_fixed(5.0)));
        scene.add_entity(id(2), FixedVec2::from_ints(10, 0), FIXED_ONE);
        assert_eq!((scene.wall_count(), scene.entity_count()), (1, 1));

        let hit = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, None);
        assert_eq!(hit.map(|h| h.target), Some(HitTarget::Wall(wall)));
        assert_eq!(hit.map(|h| h.distance), Some(to_fixed(4.0)));
    }

    #[test]
    fn test_sweep_radius_widens_contact() {
        let mut scene = CollisionScene::new();
        scene.add_entity(id(2), FixedVec2::from_ints(10, 2), FIXED_ONE);

        // A thin ray passes 2 units from center: miss for radius 1.
        let ray = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, None);
        assert!(ray.is_none());

        // A sphere of radius 1.5 grazes it.
        let sweep = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), to_fixed(1.5), None);
        assert_eq!(sweep.map(|h| h.target), Some(HitTarget::Entity(id(2))));
    }

    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        let mut scene = CollisionScene::new();
        scene.add_wall(Aabb::from_center(FixedVec2::from_ints(5, 5), FIXED_ONE, FIXED_ONE));
        let hit = scene.trace(FixedVec2::ZERO, FixedVec2::RIGHT, to_fixed(50.0), 0, None);
        assert!(hit.is_none());
    }

    #[test]
    fn test_overlapping_bodies() {
        let bodies = [
            (id(1), FixedVec2::ZERO),
            (id(2), FixedVec2::from_ints(1, 0)),
            (id(3), FixedVec2::from_ints(20, 0)),
        ];
        let set = overlapping_bodies(&bodies, FIXED_ONE);
        assert!(set.contains(&id(1)));
        assert!(set.contains(&id(2)));
        assert!(!set.contains(&id(3)));
    }
}
