//! Dynamic Obstacles
//!
//! Each maze cell owns up to two wall axes (X and Z). A dynamic axis is a
//! two-state linear actuator driven only by how many vehicles are inside its
//! trigger volume:
//!
//! ```text
//! mode      occupied        empty
//! Rising    -> high         -> low
//! Falling   -> low          -> high
//! Static    stays high
//! ```
//!
//! A wall blocks traces while its height is above `low`.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::core::fixed::{Fixed, TICK_DURATION, to_fixed, fixed_mul, fixed_move_toward};
use crate::core::vec2::FixedVec2;
use crate::game::arena::{Axis, MazeLayout, WallKind};
use crate::game::authority::Authority;
use crate::game::collision::Aabb;
use crate::game::state::PlayerId;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Actuator settings in world units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Retracted height
    pub low: f64,
    /// Extended height
    pub high: f64,
    /// Units per second
    pub speed: f64,
    /// How far outside the wall footprint a vehicle counts as near
    pub trigger_margin: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            low: -2.0,
            high: 2.0,
            speed: 10.0,
            trigger_margin: 2.0,
        }
    }
}

impl ObstacleConfig {
    /// Convert to fixed-point rules for the tick.
    pub fn compile(&self) -> ActuatorRules {
        let speed = to_fixed(self.speed);
        ActuatorRules {
            low: to_fixed(self.low),
            high: to_fixed(self.high),
            step: fixed_mul(speed, TICK_DURATION),
            trigger_margin: to_fixed(self.trigger_margin),
        }
    }
}

/// Fixed-point actuator parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActuatorRules {
    /// Retracted height
    pub low: Fixed,
    /// Extended height
    pub high: Fixed,
    /// Height change per tick
    pub step: Fixed,
    /// Trigger volume margin
    pub trigger_margin: Fixed,
}

// =============================================================================
// WALL STATE
// =============================================================================

/// Actuation behaviour of one wall axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallMode {
    /// Never moves
    Static,
    /// Extends while occupied
    Rising,
    /// Retracts while occupied
    Falling,
}

/// One side of a cell's wall pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallAxis {
    /// Actuation behaviour
    pub mode: WallMode,
    /// Vehicles currently inside the trigger volume
    pub proximity_count: u32,
    /// Current height, always within `[low, high]`
    pub current_height: Fixed,
    /// Footprint on the ground plane
    pub bounds: Aabb,
}

impl WallAxis {
    fn new(mode: WallMode, bounds: Aabb, rules: &ActuatorRules) -> Self {
        let current_height = match mode {
            WallMode::Rising => rules.low,
            WallMode::Static | WallMode::Falling => rules.high,
        };
        Self {
            mode,
            proximity_count: 0,
            current_height,
            bounds,
        }
    }

    /// Height the actuator is currently moving toward.
    pub fn target_height(&self, rules: &ActuatorRules) -> Fixed {
        let occupied = self.proximity_count > 0;
        match (self.mode, occupied) {
            (WallMode::Static, _) => rules.high,
            (WallMode::Rising, true) | (WallMode::Falling, false) => rules.high,
            (WallMode::Rising, false) | (WallMode::Falling, true) => rules.low,
        }
    }

    /// True if the wall currently blocks movement and traces.
    #[inline]
    pub fn is_blocking(&self, rules: &ActuatorRules) -> bool {
        self.current_height > rules.low
    }
}

/// The wall pair owned by one maze cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicWallSegment {
    /// Owning cell
    pub cell: usize,
    /// Wall running along X, if present
    pub x: Option<WallAxis>,
    /// Wall running along Z, if present
    pub z: Option<WallAxis>,
}

impl DynamicWallSegment {
    fn axis(&self, axis: Axis) -> Option<&WallAxis> {
        match axis {
            Axis::X => self.x.as_ref(),
            Axis::Z => self.z.as_ref(),
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> Option<&mut WallAxis> {
        match axis {
            Axis::X => self.x.as_mut(),
            Axis::Z => self.z.as_mut(),
        }
    }
}

/// Address of a single wall axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WallRef {
    /// Owning cell
    pub cell: usize,
    /// Which of the cell's walls
    pub axis: Axis,
}

/// Replicated view of one wall axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallView {
    /// Wall address
    pub wall: WallRef,
    /// Actuation behaviour
    pub mode: WallMode,
    /// Current height
    pub height: Fixed,
    /// Current proximity count
    pub proximity_count: u32,
}

/// Every standing wall in the arena, keyed by owning cell.
#[derive(Clone, Debug)]
pub struct WallSet {
    authority: Authority,
    rules: ActuatorRules,
    segments: BTreeMap<usize, DynamicWallSegment>,
}

impl WallSet {
    /// Build from a generated layout. Carved and removed walls are omitted.
    pub fn from_layout(layout: &MazeLayout, authority: Authority, rules: ActuatorRules) -> Self {
        let mut segments: BTreeMap<usize, DynamicWallSegment> = BTreeMap::new();
        for edge in layout.present_edges() {
            let mode = match edge.kind {
                WallKind::Rising => WallMode::Rising,
                WallKind::Falling => WallMode::Falling,
                _ => WallMode::Static,
            };
            let axis = WallAxis::new(mode, edge.bounds, &rules);
            let segment = segments.entry(edge.node2).or_insert(DynamicWallSegment {
                cell: edge.node2,
                x: None,
                z: None,
            });
            match edge.axis {
                Axis::X => segment.x = Some(axis),
                Axis::Z => segment.z = Some(axis),
            }
        }
        Self { authority, rules, segments }
    }

    /// Actuator parameters.
    pub fn rules(&self) -> &ActuatorRules {
        &self.rules
    }

    /// Look up one wall axis.
    pub fn axis(&self, wall: WallRef) -> Option<&WallAxis> {
        self.segments.get(&wall.cell).and_then(|s| s.axis(wall.axis))
    }

    /// Look up a cell's wall pair.
    pub fn segment(&self, cell: usize) -> Option<&DynamicWallSegment> {
        self.segments.get(&cell)
    }

    /// All standing axes in (cell, axis) order.
    pub fn axes(&self) -> impl Iterator<Item = (WallRef, &WallAxis)> {
        self.segments.values().flat_map(|s| {
            let x = s.x.as_ref().map(|a| (WallRef { cell: s.cell, axis: Axis::X }, a));
            let z = s.z.as_ref().map(|a| (WallRef { cell: s.cell, axis: Axis::Z }, a));
            x.into_iter().chain(z)
        })
    }

    /// Footprints of every wall that currently blocks.
    pub fn blocking_bounds(&self) -> impl Iterator<Item = (WallRef, Aabb)> + '_ {
        self.axes()
            .filter(|(_, a)| a.is_blocking(&self.rules))
            .map(|(r, a)| (r, a.bounds))
    }

    /// A vehicle entered a trigger volume. Authority only.
    pub fn enter(&mut self, wall: WallRef) -> bool {
        if !self.authority.is_authority() {
            return false;
        }
        match self.segments.get_mut(&wall.cell).and_then(|s| s.axis_mut(wall.axis)) {
            Some(axis) => {
                axis.proximity_count = axis.proximity_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// A vehicle left a trigger volume. Authority only; never below zero.
    pub fn exit(&mut self, wall: WallRef) -> bool {
        if !self.authority.is_authority() {
            return false;
        }
        match self.segments.get_mut(&wall.cell).and_then(|s| s.axis_mut(wall.axis)) {
            Some(axis) => {
                axis.proximity_count = axis.proximity_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Move every non-static axis one tick toward its target. Authority only.
    pub fn actuate(&mut self) {
        if !self.authority.is_authority() {
            return;
        }
        let rules = self.rules;
        for segment in self.segments.values_mut() {
            for axis in [segment.x.as_mut(), segment.z.as_mut()].into_iter().flatten() {
                if axis.mode == WallMode::Static {
                    continue;
                }
                let target = axis.target_height(&rules);
                axis.current_height = fixed_move_toward(axis.current_height, target, rules.step)
                    .clamp(rules.low, rules.high);
            }
        }
    }

    /// Replicated views in (cell, axis) order.
    pub fn views(&self) -> Vec<WallView> {
        self.axes()
            .map(|(wall, a)| WallView {
                wall,
                mode: a.mode,
                height: a.current_height,
                proximity_count: a.proximity_count,
            })
            .collect()
    }

    /// Overwrite heights and counts from the authority's snapshot.
    pub(crate) fn apply_views(&mut self, views: &[WallView]) {
        for view in views {
            if let Some(axis) = self.segments.get_mut(&view.wall.cell).and_then(|s| s.axis_mut(view.wall.axis)) {
                axis.current_height = view.height.clamp(self.rules.low, self.rules.high);
                axis.proximity_count = view.proximity_count;
            }
        }
    }
}

// =============================================================================
// PROXIMITY
// =============================================================================

/// Derives enter/exit events from per-tick positions.
///
/// Keeps the set of (wall, vehicle) pairs that overlapped last tick; the
/// difference against this tick's set becomes enter and exit calls. A
/// vehicle that disappears from `bodies` (eliminated or left) produces exits.
#[derive(Clone, Debug, Default)]
pub struct ProximityTracker {
    occupied: BTreeSet<(WallRef, PlayerId)>,
}

impl ProximityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs currently inside a trigger volume.
    pub fn occupied(&self) -> &BTreeSet<(WallRef, PlayerId)> {
        &self.occupied
    }

    /// Diff this tick's overlaps against the previous tick and feed the
    /// wall counters. Returns (entered, exited).
    pub fn update(
        &mut self,
        walls: &mut WallSet,
        bodies: &[(PlayerId, FixedVec2)],
        radius: Fixed,
    ) -> (usize, usize) {
        if !walls.authority.is_authority() {
            return (0, 0);
        }

        let margin = walls.rules.trigger_margin;
        let mut current = BTreeSet::new();
        for (wall, axis) in walls.axes() {
            if axis.mode == WallMode::Static {
                continue;
            }
            let trigger = axis.bounds.inflate(margin);
            for (id, position) in bodies {
                if trigger.overlaps_circle(*position, radius) {
                    current.insert((wall, *id));
                }
            }
        }

        let entered: Vec<WallRef> = current.difference(&self.occupied).map(|(w, _)| *w).collect();
        let exited: Vec<WallRef> = self.occupied.difference(&current).map(|(w, _)| *w).collect();
        for wall in &entered {
            walls.enter(*wall);
        }
        for wall in &exited {
            walls.exit(*wall);
        }
        if !entered.is_empty() || !exited.is_empty() {
            trace!("Proximity: {} entered, {} exited", entered.len(), exited.len());
        }

        self.occupied = current;
        (entered.len(), exited.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{Fixed, FIXED_ONE};
    use crate::game::arena::{ArenaConfig, ArenaGenerator};
    use proptest::prelude::*;

    /// Default actuator bounds: -2.0 and +2.0.
    const WALL_LOW: Fixed = -2 * FIXED_ONE;
    const WALL_HIGH: Fixed = 2 * FIXED_ONE;

    fn rules() -> ActuatorRules {
        ObstacleConfig::default().compile()
    }

    fn layout(percents: (u32, u32, u32)) -> MazeLayout {
        ArenaGenerator::generate_from(&ArenaConfig {
            rows: 6,
            cols: 6,
            removed_percent: percents.0,
            falling_percent: percents.1,
            rising_percent: percents.2,
            ..ArenaConfig::default()
        })
        .unwrap()
    }

    fn first_with_mode(walls: &WallSet, mode: WallMode) -> WallRef {
        walls.axes().find(|(_, a)| a.mode == mode).map(|(r, _)| r).unwrap()
    }

    #[test]
    fn test_compiled_rules() {
        let r = rules();
        assert_eq!(r.low, WALL_LOW);
        assert_eq!(r.high, WALL_HIGH);
        assert_eq!(r.step, fixed_mul(to_fixed(10.0), TICK_DURATION));
    }

    #[test]
    fn test_initial_heights() {
        let walls = WallSet::from_layout(&layout((0, 30, 30)), Authority::Authority, rules());
        for (_, axis) in walls.axes() {
            match axis.mode {
                WallMode::Rising => assert_eq!(axis.current_height, WALL_LOW),
                _ => assert_eq!(axis.current_height, WALL_HIGH),
            }
        }
        let l = layout((0, 30, 30));
        let standing = l.present_edges().count();
        assert_eq!(walls.axes().count(), standing);
    }

    #[test]
    fn test_rising_extends_while_occupied() {
        let mut walls = WallSet::from_layout(&layout((0, 0, 50)), Authority::Authority, rules());
        let wall = first_with_mode(&walls, WallMode::Rising);
        assert!(!walls.axis(wall).unwrap().is_blocking(&rules()));

        walls.enter(wall);
        walls.actuate();
        let h1 = walls.axis(wall).unwrap().current_height;
        assert_eq!(h1, WALL_LOW + rules().step);

        for _ in 0..100 {
            walls.actuate();
        }
        assert_eq!(walls.axis(wall).unwrap().current_height, WALL_HIGH);

        walls.exit(wall);
        for _ in 0..100 {
            walls.actuate();
        }
        assert_eq!(walls.axis(wall).unwrap().current_height, WALL_LOW);
    }

    #[test]
    fn test_falling_retracts_while_occupied() {
        let mut walls = WallSet::from_layout(&layout((0, 50, 0)), Authority::Authority, rules());
        let wall = first_with_mode(&walls, WallMode::Falling);
        assert!(walls.axis(wall).unwrap().is_blocking(&rules()));

        walls.enter(wall);
        for _ in 0..100 {
            walls.actuate();
        }
        assert_eq!(walls.axis(wall).unwrap().current_height, WALL_LOW);
        assert_eq!(walls.blocking_bounds().filter(|(r, _)| *r == wall).count(), 0);
    }

    #[test]
    fn test_static_never_moves() {
        let mut walls = WallSet::from_layout(&layout((0, 0, 0)), Authority::Authority, rules());
        let wall = first_with_mode(&walls, WallMode::Static);
        walls.enter(wall);
        walls.actuate();
        assert_eq!(walls.axis(wall).unwrap().current_height, WALL_HIGH);
    }

    #[test]
    fn test_exit_without_enter_stays_zero() {
        let mut walls = WallSet::from_layout(&layout((0, 0, 50)), Authority::Authority, rules());
        let wall = first_with_mode(&walls, WallMode::Rising);
        walls.exit(wall);
        walls.exit(wall);
        assert_eq!(walls.axis(wall).unwrap().proximity_count, 0);
        walls.enter(wall);
        assert_eq!(walls.axis(wall).unwrap().proximity_count, 1);
    }

    #[test]
    fn test_replica_does_not_mutate() {
        let mut walls = WallSet::from_layout(&layout((0, 0, 50)), Authority::NotAuthority, rules());
        let wall = first_with_mode(&walls, WallMode::Rising);
        assert!(!walls.enter(wall));
        walls.actuate();
        let axis = walls.axis(wall).unwrap();
        assert_eq!(axis.proximity_count, 0);
        assert_eq!(axis.current_height, WALL_LOW);
    }

    #[test]
    fn test_tracker_enters_and_exits() {
        let mut walls = WallSet::from_layout(&layout((0, 0, 50)), Authority::Authority, rules());
        let wall = first_with_mode(&walls, WallMode::Rising);
        let center = walls.axis(wall).unwrap().bounds.center();
        let id = PlayerId::new([7; 16]);
        let mut tracker = ProximityTracker::new();

        assert_eq!(tracker.update(&mut walls, &[(id, center)], FIXED_ONE).0 >= 1, true);
        assert_eq!(walls.axis(wall).unwrap().proximity_count, 1);

        // Staying inside is not a second enter
        tracker.update(&mut walls, &[(id, center)], FIXED_ONE);
        assert_eq!(walls.axis(wall).unwrap().proximity_count, 1);

        // Vanishing (eliminated or left) is an exit
        tracker.update(&mut walls, &[], FIXED_ONE);
        assert_eq!(walls.axis(wall).unwrap().proximity_count, 0);
        assert!(tracker.occupied().is_empty());
    }

    proptest! {
        #[test]
        fn prop_counter_never_negative(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut walls = WallSet::from_layout(&layout((0, 50, 0)), Authority::Authority, rules());
            let wall = first_with_mode(&walls, WallMode::Falling);
            let mut expected: u32 = 0;
            for enter in ops {
                if enter {
                    walls.enter(wall);
                    expected += 1;
                } else {
                    walls.exit(wall);
                    expected = expected.saturating_sub(1);
                }
                walls.actuate();
                let axis = walls.axis(wall).unwrap();
                prop_assert_eq!(axis.proximity_count, expected);
                prop_assert!(axis.current_height >= WALL_LOW && axis.current_height <= WALL_HIGH);
            }
        }
    }
}
