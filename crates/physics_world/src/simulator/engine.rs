//! Physics engine seam and the bundled point-mass integrator.
//!
//! The integrator advances every movable body with semi-implicit Euler under
//! gravity, quadratic air drag relative to the wind, and contact against the
//! ground plane and the top faces of static boxes and tables. Bodies do not
//! collide with each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::types::{ObjectId, ObjectKind, DEFAULT_CROSS_SECTION};
use super::world_model::{Action, Environment, World, WorldDocument, WorldObject};
use crate::geometry::{
    quat_integrate, vec3_add, vec3_is_finite, vec3_norm, vec3_scale, vec3_sub, Quat, Vec3,
    ZERO_VEC3,
};

pub const DEFAULT_MAX_STEPS: u64 = 200_000;
pub const DEFAULT_GROUND_RESTITUTION: f64 = 0.3;
pub const DEFAULT_GROUND_FRICTION: f64 = 0.8;
pub const DEFAULT_BODY_RESTITUTION: f64 = 0.3;
pub const DEFAULT_BODY_FRICTION: f64 = 0.6;
pub const DEFAULT_BODY_ROLLING_FRICTION: f64 = 0.01;
const MIN_SPEED: f64 = 1e-6;

// ============================================================================
// Engine seam
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// Sleep one time step per integration step. Affects pacing only.
    pub realtime: bool,
    pub max_steps: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            realtime: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub position: Vec3,
    pub velocity: Vec3,
}

pub type Trajectory = BTreeMap<ObjectId, Vec<TrajectorySample>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub final_state: WorldDocument,
    #[serde(default)]
    pub trajectory: Trajectory,
    pub steps: u64,
    pub simulated_time: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid time step: {time_step}")]
    InvalidTimeStep { time_step: f64 },
    #[error("simulation needs {steps} steps, limit is {max_steps}")]
    TooManySteps { steps: u64, max_steps: u64 },
    #[error("simulation diverged for object `{object_id}` at step {step}")]
    Diverged { object_id: ObjectId, step: u64 },
}

pub trait PhysicsEngine {
    fn simulate(
        &mut self,
        world: &World,
        options: &SimulationOptions,
    ) -> Result<SimulationOutcome, SimulationError>;
}

// ============================================================================
// Point-mass engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PointMassEngine {
    pub ground_restitution: f64,
    pub ground_friction: f64,
    pub record_trajectory: bool,
}

impl Default for PointMassEngine {
    fn default() -> Self {
        Self {
            ground_restitution: DEFAULT_GROUND_RESTITUTION,
            ground_friction: DEFAULT_GROUND_FRICTION,
            record_trajectory: true,
        }
    }
}

impl PhysicsEngine for PointMassEngine {
    fn simulate(
        &mut self,
        world: &World,
        options: &SimulationOptions,
    ) -> Result<SimulationOutcome, SimulationError> {
        let time_step = world.environment.time_step;
        if !(time_step > 0.0 && time_step.is_finite()) {
            return Err(SimulationError::InvalidTimeStep { time_step });
        }
        let steps = world.environment.step_count();
        if steps > options.max_steps {
            return Err(SimulationError::TooManySteps {
                steps,
                max_steps: options.max_steps,
            });
        }

        let mut scene = Scene::acquire(self, world);
        scene.apply_impulses(&world.actions);
        // A step too long for a `Duration` runs unpaced.
        let pacing = if options.realtime {
            Duration::try_from_secs_f64(time_step).ok()
        } else {
            None
        };
        for _ in 0..steps {
            scene.step()?;
            if let Some(pacing) = pacing {
                thread::sleep(pacing);
            }
        }
        debug!(steps, bodies = scene.bodies.len(), "simulation finished");
        Ok(scene.release())
    }
}

// ============================================================================
// Scene handle
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Body {
    object_index: usize,
    id: ObjectId,
    is_ball: bool,
    position: Vec3,
    velocity: Vec3,
    angular_velocity: Vec3,
    orientation: Quat,
    mass: f64,
    /// Distance from the body centre to its lowest point.
    contact_offset: f64,
    area: f64,
    restitution: f64,
    friction: f64,
    rolling_friction: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Platform {
    min: [f64; 2],
    max: [f64; 2],
    top: f64,
}

/// One acquired simulation run. Owns the integration state between
/// `acquire` and `release`; `reset` rewinds it to the acquired state.
#[derive(Debug, Clone)]
pub struct Scene {
    world: World,
    environment: Environment,
    bodies: Vec<Body>,
    initial_bodies: Vec<Body>,
    platforms: Vec<Platform>,
    ground_z: f64,
    ground_restitution: f64,
    ground_friction: f64,
    record_trajectory: bool,
    trajectory: Trajectory,
    steps: u64,
}

impl Scene {
    pub fn acquire(engine: &PointMassEngine, world: &World) -> Self {
        let bodies: Vec<Body> = world
            .objects
            .iter()
            .enumerate()
            .filter(|(_, object)| !object.is_immovable())
            .map(|(index, object)| body_from_object(index, object))
            .collect();
        let platforms = world
            .objects
            .iter()
            .filter(|object| {
                object.is_static && matches!(object.kind, ObjectKind::Box | ObjectKind::Table)
            })
            .map(platform_from_object)
            .collect();
        let ground_z = world
            .objects
            .iter()
            .find(|object| object.kind == ObjectKind::Plane)
            .map(|plane| plane.initial_state.position[2])
            .unwrap_or(0.0);
        let trajectory = bodies
            .iter()
            .map(|body| (body.id.clone(), Vec::new()))
            .collect();

        Self {
            world: world.clone(),
            environment: world.environment.clone(),
            initial_bodies: bodies.clone(),
            bodies,
            platforms,
            ground_z,
            ground_restitution: engine.ground_restitution,
            ground_friction: engine.ground_friction,
            record_trajectory: engine.record_trajectory,
            trajectory,
            steps: 0,
        }
    }

    pub fn reset(&mut self) {
        self.bodies = self.initial_bodies.clone();
        for samples in self.trajectory.values_mut() {
            samples.clear();
        }
        self.steps = 0;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// `push` and `apply_force` act as an instantaneous impulse of
    /// `direction * magnitude` on their target.
    pub fn apply_impulses(&mut self, actions: &[Action]) {
        for action in actions.iter().filter(|action| action.kind.is_impulse()) {
            let Some(body) = self
                .bodies
                .iter_mut()
                .find(|body| body.id == action.target_id)
            else {
                continue;
            };
            let impulse = vec3_scale(action.direction, action.magnitude);
            body.velocity = vec3_add(body.velocity, vec3_scale(impulse, 1.0 / body.mass));
            debug!(target_id = %body.id, ?impulse, "impulse applied");
        }
    }

    pub fn step(&mut self) -> Result<(), SimulationError> {
        let dt = self.environment.time_step;
        let gravity = self.environment.gravity;
        let wind_velocity = self.environment.wind.velocity();
        let drag_factor = 0.5 * self.environment.air_density * self.environment.drag_coefficient;
        let settle_speed = 2.0 * vec3_norm(gravity) * dt;

        for body in &mut self.bodies {
            let mut acceleration = gravity;
            let relative = vec3_sub(body.velocity, wind_velocity);
            let speed = vec3_norm(relative);
            if speed > MIN_SPEED && drag_factor > 0.0 {
                let drag = drag_factor * body.area * speed * speed;
                let drag_accel = vec3_scale(relative, -drag / (speed * body.mass));
                acceleration = vec3_add(acceleration, drag_accel);
            }

            let previous_bottom = body.position[2] - body.contact_offset;
            body.velocity = vec3_add(body.velocity, vec3_scale(acceleration, dt));
            body.position = vec3_add(body.position, vec3_scale(body.velocity, dt));
            body.orientation = quat_integrate(body.orientation, body.angular_velocity, dt);

            let support = support_height(&self.platforms, self.ground_z, body, previous_bottom);
            if body.position[2] - body.contact_offset < support {
                body.position[2] = support + body.contact_offset;
                let surface = Surface {
                    restitution: self.ground_restitution,
                    friction: self.ground_friction,
                };
                resolve_contact(body, &surface, gravity, dt, settle_speed);
            }

            if !vec3_is_finite(&body.position) || !vec3_is_finite(&body.velocity) {
                return Err(SimulationError::Diverged {
                    object_id: body.id.clone(),
                    step: self.steps,
                });
            }
            if self.record_trajectory {
                if let Some(samples) = self.trajectory.get_mut(&body.id) {
                    samples.push(TrajectorySample {
                        position: body.position,
                        velocity: body.velocity,
                    });
                }
            }
        }
        self.steps += 1;
        Ok(())
    }

    /// Ends the run and writes body states back into a copy of the world.
    pub fn release(self) -> SimulationOutcome {
        let mut world = self.world;
        for body in &self.bodies {
            let Some(object) = world.objects.get_mut(body.object_index) else {
                continue;
            };
            let state = &mut object.initial_state;
            state.position = body.position;
            state.velocity = body.velocity;
            state.orientation = body.orientation;
            if state.angular_velocity.is_some() || body.angular_velocity != ZERO_VEC3 {
                state.angular_velocity = Some(body.angular_velocity);
            }
        }
        SimulationOutcome {
            final_state: WorldDocument {
                objects: world.objects,
                environment: Some(world.environment),
            },
            trajectory: self.trajectory,
            steps: self.steps,
            simulated_time: self.steps as f64 * self.environment.time_step,
        }
    }
}

fn body_from_object(object_index: usize, object: &WorldObject) -> Body {
    let state = &object.initial_state;
    let is_ball = object.kind == ObjectKind::Ball;
    let area = object.cross_section.unwrap_or_else(|| match object.radius {
        Some(radius) => std::f64::consts::PI * radius * radius,
        None => DEFAULT_CROSS_SECTION,
    });
    let contact_offset = if is_ball {
        object.radius.unwrap_or_else(|| object.effective_radius())
    } else {
        object
            .size
            .map(|size| size[2] / 2.0)
            .unwrap_or_else(|| object.cross_section_or_default().sqrt())
    };

    // A moving ball with no stated spin is assumed to roll.
    let angular_velocity = match state.angular_velocity {
        Some(spin) => spin,
        None if is_ball && vec3_norm(state.velocity) > MIN_SPEED && contact_offset > 0.0 => {
            [0.0, state.velocity[0] / contact_offset, 0.0]
        }
        None => ZERO_VEC3,
    };

    Body {
        object_index,
        id: object.id.clone(),
        is_ball,
        position: state.position,
        velocity: state.velocity,
        angular_velocity,
        orientation: state.orientation,
        mass: object.dynamic_mass(),
        contact_offset,
        area,
        restitution: object.restitution.unwrap_or(DEFAULT_BODY_RESTITUTION),
        friction: object.friction.unwrap_or(DEFAULT_BODY_FRICTION),
        rolling_friction: object
            .rolling_friction
            .unwrap_or(DEFAULT_BODY_ROLLING_FRICTION),
    }
}

fn platform_from_object(object: &WorldObject) -> Platform {
    let half = match object.size {
        Some(size) => [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0],
        None => {
            let side = object.cross_section_or_default().sqrt();
            [side, side, side]
        }
    };
    let [x, y, z] = object.initial_state.position;
    Platform {
        min: [x - half[0], y - half[1]],
        max: [x + half[0], y + half[1]],
        top: z + half[2],
    }
}

/// Highest surface under the body that it was above before this step.
fn support_height(platforms: &[Platform], ground_z: f64, body: &Body, previous_bottom: f64) -> f64 {
    let [x, y, _] = body.position;
    platforms
        .iter()
        .filter(|platform| {
            x >= platform.min[0]
                && x <= platform.max[0]
                && y >= platform.min[1]
                && y <= platform.max[1]
                && previous_bottom >= platform.top - 1e-9
        })
        .map(|platform| platform.top)
        .fold(ground_z, f64::max)
}

#[derive(Debug, Clone, Copy)]
struct Surface {
    restitution: f64,
    friction: f64,
}

/// Restitution combines by maximum, friction by geometric mean.
fn resolve_contact(body: &mut Body, surface: &Surface, gravity: Vec3, dt: f64, settle_speed: f64) {
    if body.velocity[2] < 0.0 {
        let restitution = body.restitution.max(surface.restitution);
        let rebound = -body.velocity[2] * restitution;
        body.velocity[2] = if rebound < settle_speed { 0.0 } else { rebound };
    }

    // Only a resting or sliding contact drags on the horizontal motion.
    if body.velocity[2] != 0.0 {
        return;
    }
    let coefficient = if body.is_ball {
        body.rolling_friction
    } else {
        (body.friction * surface.friction).sqrt()
    };
    let decel = coefficient * gravity[2].abs() * dt;
    let horizontal = (body.velocity[0] * body.velocity[0] + body.velocity[1] * body.velocity[1]).sqrt();
    if horizontal <= decel {
        body.velocity[0] = 0.0;
        body.velocity[1] = 0.0;
    } else {
        let scale = (horizontal - decel) / horizontal;
        body.velocity[0] *= scale;
        body.velocity[1] *= scale;
    }
    if body.is_ball && body.contact_offset > 0.0 {
        body.angular_velocity = [
            -body.velocity[1] / body.contact_offset,
            body.velocity[0] / body.contact_offset,
            body.angular_velocity[2],
        ];
    }
}
