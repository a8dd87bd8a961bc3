//! Movement Collaborator
//!
//! Vehicle physics lives outside the simulation core. The core only needs
//! to read poses and issue a handful of commands (drive, teleport, freeze,
//! hide), expressed by [`MovementRelay`]. Every command returns `false` when
//! the relay has no body for the entity; callers skip that entity for the
//! tick and carry on.
//!
//! [`KinematicRelay`] is a small deterministic implementation used by the
//! host binary, replays and tests.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, TICK_DURATION, to_fixed, fixed_mul, fixed_move_toward};
use crate::core::vec2::FixedVec2;
use crate::game::arena::SpawnPoint;
use crate::game::collision::Aabb;
use crate::game::input::InputFrame;
use crate::game::state::PlayerId;

/// Where a vehicle is and which way it faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPose {
    /// Ground-plane position
    pub position: FixedVec2,
    /// Unit facing direction
    pub heading: FixedVec2,
    /// Height above the floor
    pub elevation: Fixed,
}

impl Default for EntityPose {
    fn default() -> Self {
        Self {
            position: FixedVec2::ZERO,
            heading: FixedVec2::FORWARD,
            elevation: 0,
        }
    }
}

/// Commands and queries the simulation issues to vehicle physics.
pub trait MovementRelay {
    /// Current pose, if the entity has a body.
    fn pose(&self, id: PlayerId) -> Option<EntityPose>;

    /// Apply one tick of driver input.
    fn drive(&mut self, id: PlayerId, input: &InputFrame) -> bool;

    /// Place the body at a spawn point and zero its motion.
    fn teleport(&mut self, id: PlayerId, spawn: SpawnPoint) -> bool;

    /// Enable or freeze physics simulation.
    fn set_simulated(&mut self, id: PlayerId, simulated: bool) -> bool;

    /// Enable or disable colliders.
    fn set_collision_enabled(&mut self, id: PlayerId, enabled: bool) -> bool;

    /// Show or hide renderers.
    fn set_visible(&mut self, id: PlayerId, visible: bool) -> bool;

    /// Toggle collision exemption against other vehicles.
    fn set_ghost(&mut self, id: PlayerId, ghost: bool) -> bool;
}

// =============================================================================
// KINEMATIC REFERENCE RELAY
// =============================================================================

/// Handling parameters for [`KinematicRelay`], in world units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    /// Top speed (units/s)
    pub max_speed: f64,
    /// Throttle response (units/s²)
    pub acceleration: f64,
    /// Brake deceleration (units/s²)
    pub braking: f64,
    /// Heading change at full steer (approx. radians/s)
    pub turn_rate: f64,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            acceleration: 30.0,
            braking: 60.0,
            turn_rate: 2.5,
        }
    }
}

/// Per-tick step sizes derived from [`VehicleTuning`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TuningSteps {
    max_speed: Fixed,
    accel_step: Fixed,
    brake_step: Fixed,
    turn_step: Fixed,
}

impl From<&VehicleTuning> for TuningSteps {
    fn from(tuning: &VehicleTuning) -> Self {
        Self {
            max_speed: to_fixed(tuning.max_speed),
            accel_step: fixed_mul(to_fixed(tuning.acceleration), TICK_DURATION),
            brake_step: fixed_mul(to_fixed(tuning.braking), TICK_DURATION),
            turn_step: fixed_mul(to_fixed(tuning.turn_rate), TICK_DURATION),
        }
    }
}

/// One kinematic vehicle body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KinematicBody {
    /// Current pose
    pub pose: EntityPose,
    /// Signed speed along the heading
    pub speed: Fixed,
    /// Physics running
    pub simulated: bool,
    /// Colliders enabled
    pub collision_enabled: bool,
    /// Renderers enabled
    pub visible: bool,
    /// Exempt from vehicle-vehicle collision
    pub ghost: bool,
}

impl KinematicBody {
    fn new(pose: EntityPose) -> Self {
        Self {
            pose,
            speed: 0,
            simulated: true,
            collision_enabled: true,
            visible: true,
            ghost: false,
        }
    }
}

/// Deterministic integrator: throttle, brake and steer on the ground plane,
/// optionally clamped to the arena bounds. Walls are not solid here.
#[derive(Clone, Debug)]
pub struct KinematicRelay {
    bodies: BTreeMap<PlayerId, KinematicBody>,
    steps: TuningSteps,
    bounds: Option<Aabb>,
}

impl KinematicRelay {
    /// Create an empty relay.
    pub fn new(tuning: &VehicleTuning) -> Self {
        Self {
            bodies: BTreeMap::new(),
            steps: TuningSteps::from(tuning),
            bounds: None,
        }
    }

    /// Keep every body inside `bounds`.
    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Bind a body to an entity. Replaces any existing body.
    pub fn attach(&mut self, id: PlayerId, pose: EntityPose) {
        self.bodies.insert(id, KinematicBody::new(pose));
    }

    /// Unbind an entity's body.
    pub fn detach(&mut self, id: PlayerId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    /// Inspect a body.
    pub fn body(&self, id: PlayerId) -> Option<&KinematicBody> {
        self.bodies.get(&id)
    }

    /// Number of attached bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True if no bodies are attached.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn with_body(&mut self, id: PlayerId, f: impl FnOnce(&mut KinematicBody)) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                f(body);
                true
            }
            None => false,
        }
    }
}

impl MovementRelay for KinematicRelay {
    fn pose(&self, id: PlayerId) -> Option<EntityPose> {
        self.bodies.get(&id).map(|b| b.pose)
    }

    fn drive(&mut self, id: PlayerId, input: &InputFrame) -> bool {
        let steps = self.steps;
        let bounds = self.bounds;
        self.with_body(id, |body| {
            if !body.simulated {
                return;
            }

            // 1. Speed
            let (target, step) = if input.brake_pressed() {
                (0, steps.brake_step)
            } else {
                (fixed_mul(steps.max_speed, input.throttle()), steps.accel_step)
            };
            body.speed = fixed_move_toward(body.speed, target, step);

            // 2. Heading: positive steer turns clockwise seen from above
            let turn = fixed_mul(steps.turn_step, input.steer());
            if turn != 0 {
                let side = body.pose.heading.perpendicular().negate();
                let turned = (body.pose.heading + side.scale(turn)).normalize();
                if turned != FixedVec2::ZERO {
                    body.pose.heading = turned;
                }
            }

            // 3. Integrate
            let travel = fixed_mul(body.speed, TICK_DURATION);
            let mut position = body.pose.position + body.pose.heading.scale(travel);
            if let Some(b) = bounds {
                position = FixedVec2::new(
                    position.x.clamp(b.min.x, b.max.x),
                    position.z.clamp(b.min.z, b.max.z),
                );
            }
            body.pose.position = position;
        })
    }

    fn teleport(&mut self, id: PlayerId, spawn: SpawnPoint) -> bool {
        self.with_body(id, |body| {
            body.pose.position = spawn.position;
            body.pose.elevation = spawn.elevation;
            body.speed = 0;
        })
    }

    fn set_simulated(&mut self, id: PlayerId, simulated: bool) -> bool {
        self.with_body(id, |body| {
            body.simulated = simulated;
            if !simulated {
                body.speed = 0;
            }
        })
    }

    fn set_collision_enabled(&mut self, id: PlayerId, enabled: bool) -> bool {
        self.with_body(id, |body| body.collision_enabled = enabled)
    }

    fn set_visible(&mut self, id: PlayerId, visible: bool) -> bool {
        self.with_body(id, |body| body.visible = visible)
    }

    fn set_ghost(&mut self, id: PlayerId, ghost: bool) -> bool {
        self.with_body(id, |body| body.ghost = ghost)
    }
}
