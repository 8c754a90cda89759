//! Semantic actions → physics initial conditions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::ActionKind;
use super::world_model::{Action, Environment, Wind, WorldDelta, WorldObject};
use crate::geometry::{Vec3, ZERO_VEC3};

const THROW_SPEED_PER_MAGNITUDE: f64 = 5.0;
const THROW_SPIN_FACTOR: f64 = 2.0;
const THROW_RESTITUTION: f64 = 0.6;
const ROLL_SPEED_PER_MAGNITUDE: f64 = 2.0;
const ROLL_ROLLING_FRICTION: f64 = 0.02;
const BOUNCE_LIFT_PER_MAGNITUDE: f64 = 3.0;
const BOUNCE_RESTITUTION: f64 = 0.9;
const LIFT_SPEED_PER_MAGNITUDE: f64 = 3.0;
const COLLIDE_RESTITUTION: f64 = 0.5;
const COLLIDE_FRICTION: f64 = 0.5;
const DROP_NUDGE_SPEED: f64 = -0.1;
const DROP_RESTITUTION: f64 = 0.3;

/// Environment fields overridden by an environment-level action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnvironmentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_coefficient: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<Wind>,
}

impl EnvironmentOverride {
    pub fn vacuum() -> Self {
        Self {
            air_density: Some(0.0),
            drag_coefficient: Some(0.0),
            wind: Some(Wind {
                direction: ZERO_VEC3,
                strength: 0.0,
            }),
        }
    }

    pub fn apply_to(&self, environment: &mut Environment) {
        if let Some(air_density) = self.air_density {
            environment.air_density = air_density;
        }
        if let Some(drag_coefficient) = self.drag_coefficient {
            environment.drag_coefficient = drag_coefficient;
        }
        if let Some(wind) = &self.wind {
            environment.wind = wind.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PhysicsDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restitution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_friction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentOverride>,
}

impl PhysicsDelta {
    pub fn is_empty(&self) -> bool {
        self == &PhysicsDelta::default()
    }

    pub fn touches_object(&self) -> bool {
        self.velocity.is_some()
            || self.angular_velocity.is_some()
            || self.restitution.is_some()
            || self.friction.is_some()
            || self.rolling_friction.is_some()
    }

    pub fn apply_to_object(&self, object: &mut WorldObject) {
        if let Some(velocity) = self.velocity {
            object.initial_state.velocity = velocity;
        }
        if let Some(angular_velocity) = self.angular_velocity {
            object.initial_state.angular_velocity = Some(angular_velocity);
        }
        if let Some(restitution) = self.restitution {
            object.restitution = Some(restitution);
        }
        if let Some(friction) = self.friction {
            object.friction = Some(friction);
        }
        if let Some(rolling_friction) = self.rolling_friction {
            object.rolling_friction = Some(rolling_friction);
        }
    }

    pub fn apply_to_environment(&self, environment: &mut Environment) {
        if let Some(overrides) = &self.environment {
            overrides.apply_to(environment);
        }
    }
}

/// Maps one semantic action onto `target`. Pure; the result depends only on
/// the action and the target's cross section.
pub fn map_action(action: &Action, target: &WorldObject) -> PhysicsDelta {
    let mag = action.magnitude;
    let [dx, dy, dz] = action.direction;

    match &action.kind {
        ActionKind::Throw => {
            let speed = mag * THROW_SPEED_PER_MAGNITUDE;
            PhysicsDelta {
                velocity: Some([dx * speed, dy * speed, dz * speed]),
                angular_velocity: Some([dy * THROW_SPIN_FACTOR, -dx * THROW_SPIN_FACTOR, 0.0]),
                restitution: Some(THROW_RESTITUTION),
                ..PhysicsDelta::default()
            }
        }
        ActionKind::Roll => {
            let radius = target.effective_radius();
            let vx = dx * mag * ROLL_SPEED_PER_MAGNITUDE;
            let vy = dy * mag * ROLL_SPEED_PER_MAGNITUDE;
            let spin = if radius > 0.0 { vx / radius } else { 0.0 };
            PhysicsDelta {
                velocity: Some([vx, vy, 0.0]),
                angular_velocity: Some([0.0, spin, 0.0]),
                rolling_friction: Some(ROLL_ROLLING_FRICTION),
                ..PhysicsDelta::default()
            }
        }
        ActionKind::Bounce => PhysicsDelta {
            velocity: Some([dx, dy, dz.abs() + mag * BOUNCE_LIFT_PER_MAGNITUDE]),
            restitution: Some(BOUNCE_RESTITUTION),
            ..PhysicsDelta::default()
        },
        ActionKind::Stop => PhysicsDelta {
            velocity: Some(ZERO_VEC3),
            angular_velocity: Some(ZERO_VEC3),
            ..PhysicsDelta::default()
        },
        ActionKind::Lift => PhysicsDelta {
            velocity: Some([0.0, 0.0, mag * LIFT_SPEED_PER_MAGNITUDE]),
            ..PhysicsDelta::default()
        },
        ActionKind::Collide => PhysicsDelta {
            restitution: Some(COLLIDE_RESTITUTION),
            friction: Some(COLLIDE_FRICTION),
            ..PhysicsDelta::default()
        },
        ActionKind::Vacuum => PhysicsDelta {
            environment: Some(EnvironmentOverride::vacuum()),
            ..PhysicsDelta::default()
        },
        ActionKind::Drop => PhysicsDelta {
            velocity: Some([0.0, 0.0, DROP_NUDGE_SPEED]),
            restitution: Some(DROP_RESTITUTION),
            ..PhysicsDelta::default()
        },
        ActionKind::Push | ActionKind::ApplyForce | ActionKind::Other(_) => PhysicsDelta::default(),
    }
}

// ============================================================================
// Resolution against a draft
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAction {
    pub action: Action,
    pub delta: PhysicsDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionResolution {
    pub applied: Vec<AppliedAction>,
    /// Actions whose target is not an object of the draft.
    pub unresolved: Vec<Action>,
}

/// Resolves every draft action against the draft's own objects and applies
/// the resulting deltas in place. With duplicate ids the last occurrence is
/// the target, matching the one a merge keeps. Environment-level deltas need
/// an environment block; when the draft has none, one is seeded from
/// `base_environment`.
pub fn resolve_actions(draft: &mut WorldDelta, base_environment: &Environment) -> ActionResolution {
    let mut resolution = ActionResolution::default();
    let actions = draft.actions.clone();

    for action in actions {
        let Some(index) = draft
            .objects
            .iter()
            .rposition(|object| object.id == action.target_id)
        else {
            debug!(target_id = %action.target_id, kind = %action.kind, "action target not in draft, dropped");
            resolution.unresolved.push(action);
            continue;
        };

        let delta = map_action(&action, &draft.objects[index]);
        if delta.touches_object() {
            delta.apply_to_object(&mut draft.objects[index]);
        }
        if delta.environment.is_some() {
            let environment = draft
                .environment
                .get_or_insert_with(|| base_environment.clone());
            delta.apply_to_environment(environment);
        }
        debug!(target_id = %action.target_id, kind = %action.kind, "action applied");
        resolution.applied.push(AppliedAction { action, delta });
    }

    resolution
}
