//! Structural checks of a world document before it is simulated.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::world_model::{World, WorldObject};
use crate::geometry::{quat_norm, vec3_is_finite};

const ORIENTATION_NORM_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("world failed validation: {}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub trait WorldValidator {
    fn validate(&self, world: &World) -> Result<(), ValidationError>;
}

/// Checks the shape constraints of the world data model without mutating it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl WorldValidator for StructuralValidator {
    fn validate(&self, world: &World) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();

        for (index, object) in world.objects.iter().enumerate() {
            let path = format!("objects[{index}]");
            if object.id.trim().is_empty() {
                push(&mut issues, &path, "id must not be empty");
            } else if !seen.insert(object.id.as_str()) {
                push(
                    &mut issues,
                    &path,
                    &format!("duplicate object id `{}`", object.id),
                );
            }
            check_object(&mut issues, &path, object);
        }

        let env = &world.environment;
        if !vec3_is_finite(&env.gravity) {
            push(&mut issues, "environment.gravity", "must be finite");
        }
        if !vec3_is_finite(&env.wind.direction) {
            push(&mut issues, "environment.wind.direction", "must be finite");
        }
        check_non_negative(&mut issues, "environment.wind.strength", env.wind.strength);
        check_non_negative(&mut issues, "environment.air_density", env.air_density);
        check_non_negative(
            &mut issues,
            "environment.drag_coefficient",
            env.drag_coefficient,
        );
        check_non_negative(&mut issues, "environment.pressure", env.pressure);
        check_non_negative(&mut issues, "environment.temperature", env.temperature);
        if !(0.0..=1.0).contains(&env.humidity) {
            push(&mut issues, "environment.humidity", "must be within [0, 1]");
        }
        if !(env.time_step > 0.0 && env.time_step.is_finite()) {
            push(&mut issues, "environment.time_step", "must be positive");
        }
        check_non_negative(&mut issues, "environment.duration", env.duration);

        for (index, action) in world.actions.iter().enumerate() {
            let path = format!("actions[{index}]");
            if !action.magnitude.is_finite() {
                push(&mut issues, &path, "magnitude must be finite");
            }
            if !vec3_is_finite(&action.direction) {
                push(&mut issues, &path, "direction must be finite");
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn check_object(issues: &mut Vec<ValidationIssue>, path: &str, object: &WorldObject) {
    let state = &object.initial_state;
    if !vec3_is_finite(&state.position) {
        push(issues, &format!("{path}.initial_state.position"), "must be finite");
    }
    if !vec3_is_finite(&state.velocity) {
        push(issues, &format!("{path}.initial_state.velocity"), "must be finite");
    }
    if let Some(angular_velocity) = &state.angular_velocity {
        if !vec3_is_finite(angular_velocity) {
            push(
                issues,
                &format!("{path}.initial_state.angular_velocity"),
                "must be finite",
            );
        }
    }
    if (quat_norm(state.orientation) - 1.0).abs() > ORIENTATION_NORM_TOLERANCE {
        push(
            issues,
            &format!("{path}.initial_state.orientation"),
            "must be a unit quaternion",
        );
    }
    if !object.is_immovable() && !(object.dynamic_mass() > 0.0) {
        push(issues, &format!("{path}.mass"), "dynamic bodies need positive mass");
    }
    if let Some(restitution) = object.restitution {
        if !(0.0..=1.0).contains(&restitution) {
            push(issues, &format!("{path}.restitution"), "must be within [0, 1]");
        }
    }
    for (name, value) in [
        ("friction", object.friction),
        ("rolling_friction", object.rolling_friction),
        ("cross_section", object.cross_section),
        ("radius", object.radius),
    ] {
        if let Some(value) = value {
            check_non_negative(issues, &format!("{path}.{name}"), value);
        }
    }
    if let Some(size) = object.size {
        if size.iter().any(|extent| !(*extent >= 0.0)) {
            push(issues, &format!("{path}.size"), "extents must be non-negative");
        }
    }
}

fn check_non_negative(issues: &mut Vec<ValidationIssue>, path: &str, value: f64) {
    if !(value >= 0.0 && value.is_finite()) {
        push(issues, path, "must be a non-negative number");
    }
}

fn push(issues: &mut Vec<ValidationIssue>, path: &str, message: &str) {
    issues.push(ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::types::ObjectKind;

    fn world_with(objects: Vec<WorldObject>) -> World {
        World {
            objects,
            ..World::default()
        }
    }

    #[test]
    fn default_world_is_valid() {
        let world = world_with(vec![
            WorldObject::new("ball1", ObjectKind::Ball).with_position([0.0, 0.0, 1.0]),
            WorldObject::new("table1", ObjectKind::Table).with_static(true),
        ]);
        assert_eq!(StructuralValidator.validate(&world), Ok(()));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let world = world_with(vec![
            WorldObject::new("ball1", ObjectKind::Ball),
            WorldObject::new("ball1", ObjectKind::Box),
        ]);
        let err = StructuralValidator.validate(&world).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.to_string().contains("duplicate object id"));
    }

    #[test]
    fn out_of_range_properties_are_reported_with_paths() {
        let mut ball = WorldObject::new("ball1", ObjectKind::Ball);
        ball.restitution = Some(1.5);
        ball.initial_state.mass = 0.0;
        ball.initial_state.orientation = [0.0, 0.0, 0.0, 0.0];
        let mut world = world_with(vec![ball]);
        world.environment.air_density = -1.0;

        let err = StructuralValidator.validate(&world).unwrap_err();
        let paths: Vec<&str> = err.issues.iter().map(|issue| issue.path.as_str()).collect();
        assert!(paths.contains(&"objects[0].restitution"));
        assert!(paths.contains(&"objects[0].mass"));
        assert!(paths.contains(&"objects[0].initial_state.orientation"));
        assert!(paths.contains(&"environment.air_density"));
    }

    #[test]
    fn static_bodies_need_no_mass() {
        let mut table = WorldObject::new("table1", ObjectKind::Table).with_static(true);
        table.initial_state.mass = 0.0;
        assert!(StructuralValidator.validate(&world_with(vec![table])).is_ok());
    }
}
