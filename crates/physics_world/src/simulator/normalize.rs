//! Conversion from loosely typed JSON drafts into typed world documents.
//!
//! Any vector that is missing, has the wrong arity, or holds a non-numeric
//! entry is replaced by its default as a whole. The only per-component repair
//! is `null` → `0.0` inside an otherwise well-formed vector.

use serde_json::{Map, Value};
use tracing::debug;

use super::memory::upsert_objects;
use super::types::{
    ActionKind, ObjectKind, DEFAULT_ACTION_MAGNITUDE, DEFAULT_AIR_DENSITY,
    DEFAULT_DRAG_COEFFICIENT, DEFAULT_DURATION, DEFAULT_GRAVITY, DEFAULT_HUMIDITY,
    DEFAULT_OBJECT_MASS, DEFAULT_PRESSURE_PA, DEFAULT_TEMPERATURE_K, DEFAULT_TIME_STEP,
};
use super::world_model::{
    Action, Environment, InitialState, Wind, World, WorldDelta, WorldDocument, WorldObject,
};
use crate::geometry::{Quat, Vec3, IDENTITY_QUAT, ZERO_VEC3};

// ============================================================================
// Documents
// ============================================================================

/// Normalizes an interpreter draft. A root that is not a JSON object yields an
/// empty delta.
pub fn normalize_delta(raw: &Value) -> WorldDelta {
    let Some(root) = raw.as_object() else {
        return WorldDelta::default();
    };
    WorldDelta {
        objects: normalize_objects(root.get("objects")),
        environment: supplied_environment(root.get("environment")).map(normalize_environment),
        actions: normalize_actions(root.get("actions")),
    }
}

/// Normalizes a complete world; the environment is always filled in.
pub fn normalize_world(raw: &Value) -> World {
    let empty = Map::new();
    let root = raw.as_object().unwrap_or(&empty);
    World {
        objects: normalize_objects(root.get("objects")),
        environment: root
            .get("environment")
            .and_then(Value::as_object)
            .map(normalize_environment)
            .unwrap_or_default(),
        actions: normalize_actions(root.get("actions")),
    }
}

/// Normalizes a persisted memory document. Duplicate ids collapse onto the
/// last occurrence so the loaded state honours id uniqueness.
pub fn normalize_document(raw: &Value) -> WorldDocument {
    let Some(root) = raw.as_object() else {
        return WorldDocument::empty();
    };
    let mut objects = Vec::new();
    upsert_objects(&mut objects, normalize_objects(root.get("objects")));
    WorldDocument {
        objects,
        environment: supplied_environment(root.get("environment")).map(normalize_environment),
    }
}

fn supplied_environment(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value
        .and_then(Value::as_object)
        .filter(|block| !block.is_empty())
}

// ============================================================================
// Objects
// ============================================================================

fn normalize_objects(value: Option<&Value>) -> Vec<WorldObject> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items.iter().filter_map(normalize_object).collect()
}

pub fn normalize_object(value: &Value) -> Option<WorldObject> {
    let Some(raw) = value.as_object() else {
        debug!(?value, "skipping non-object entry in objects");
        return None;
    };
    let Some(id) = raw.get("id").and_then(Value::as_str) else {
        debug!(?value, "skipping object without string id");
        return None;
    };

    // Older drafts nest physical properties under `properties`.
    let nested = raw.get("properties").and_then(Value::as_object);
    let property = |key: &str| {
        raw.get(key)
            .filter(|value| !value.is_null())
            .or_else(|| nested.and_then(|props| props.get(key)))
    };

    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .and_then(ObjectKind::parse)
        .unwrap_or_default();

    Some(WorldObject {
        id: id.to_string(),
        kind,
        is_static: raw.get("static").and_then(Value::as_bool).unwrap_or(false),
        mass: optional_scalar(property("mass")),
        restitution: optional_scalar(property("restitution")),
        friction: optional_scalar(property("friction")),
        rolling_friction: optional_scalar(property("rolling_friction")),
        cross_section: optional_scalar(property("cross_section")),
        radius: optional_scalar(property("radius")),
        size: property("size").and_then(parse_vec3),
        initial_state: normalize_initial_state(raw.get("initial_state")),
    })
}

fn normalize_initial_state(value: Option<&Value>) -> InitialState {
    let Some(raw) = value.and_then(Value::as_object) else {
        return InitialState::default();
    };
    InitialState {
        position: vec3_or(raw.get("position"), ZERO_VEC3),
        velocity: vec3_or(raw.get("velocity"), ZERO_VEC3),
        angular_velocity: raw
            .get("angular_velocity")
            .filter(|value| !value.is_null())
            .map(|value| vec3_or(Some(value), ZERO_VEC3)),
        orientation: quat_or(raw.get("orientation"), IDENTITY_QUAT),
        mass: scalar_or(raw.get("mass"), DEFAULT_OBJECT_MASS),
    }
}

// ============================================================================
// Environment
// ============================================================================

pub fn normalize_environment(raw: &Map<String, Value>) -> Environment {
    let wind = raw
        .get("wind")
        .and_then(Value::as_object)
        .map(|wind| Wind {
            direction: vec3_or(wind.get("direction"), ZERO_VEC3),
            strength: scalar_where(wind.get("strength"), 0.0, |value| value >= 0.0),
        })
        .unwrap_or_default();

    Environment {
        gravity: vec3_or(raw.get("gravity"), DEFAULT_GRAVITY),
        wind,
        temperature: scalar_or(raw.get("temperature"), DEFAULT_TEMPERATURE_K),
        pressure: scalar_or(raw.get("pressure"), DEFAULT_PRESSURE_PA),
        air_density: scalar_or(raw.get("air_density"), DEFAULT_AIR_DENSITY),
        drag_coefficient: scalar_or(raw.get("drag_coefficient"), DEFAULT_DRAG_COEFFICIENT),
        humidity: scalar_or(raw.get("humidity"), DEFAULT_HUMIDITY),
        time_step: scalar_where(raw.get("time_step"), DEFAULT_TIME_STEP, |value| value > 0.0),
        duration: scalar_where(raw.get("duration"), DEFAULT_DURATION, |value| value >= 0.0),
    }
}

// ============================================================================
// Actions
// ============================================================================

fn normalize_actions(value: Option<&Value>) -> Vec<Action> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items.iter().filter_map(normalize_action).collect()
}

pub fn normalize_action(value: &Value) -> Option<Action> {
    let raw = value.as_object()?;
    let target_id = raw
        .get("target_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .map(ActionKind::parse)
        .unwrap_or_else(|| ActionKind::Other(String::new()));
    Some(Action {
        target_id: target_id.to_string(),
        kind,
        magnitude: scalar_or(raw.get("magnitude"), DEFAULT_ACTION_MAGNITUDE),
        direction: vec3_or(raw.get("direction"), ZERO_VEC3),
    })
}

// ============================================================================
// Field helpers
// ============================================================================

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn scalar_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(finite_number).unwrap_or(default)
}

fn scalar_where(value: Option<&Value>, default: f64, accept: impl Fn(f64) -> bool) -> f64 {
    value
        .and_then(finite_number)
        .filter(|number| accept(*number))
        .unwrap_or(default)
}

fn optional_scalar(value: Option<&Value>) -> Option<f64> {
    value.and_then(finite_number)
}

fn parse_components<const N: usize>(value: &Value) -> Option<[f64; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = match item {
            Value::Null => 0.0,
            other => finite_number(other)?,
        };
    }
    Some(out)
}

fn parse_vec3(value: &Value) -> Option<Vec3> {
    parse_components::<3>(value)
}

fn vec3_or(value: Option<&Value>, default: Vec3) -> Vec3 {
    value.and_then(parse_vec3).unwrap_or(default)
}

fn quat_or(value: Option<&Value>, default: Quat) -> Quat {
    value
        .and_then(parse_components::<4>)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vector_with_wrong_type_is_replaced_wholesale() {
        let delta = normalize_delta(&json!({
            "objects": [{
                "id": "ball1",
                "initial_state": {"position": [1.0, "x", 2.0], "velocity": "not-a-vector"}
            }]
        }));
        let state = &delta.objects[0].initial_state;
        assert_eq!(state.position, [0.0, 0.0, 0.0]);
        assert_eq!(state.velocity, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn null_components_become_zero() {
        let delta = normalize_delta(&json!({
            "objects": [{"id": "ball1", "initial_state": {"position": [1.5, null, 2.0]}}]
        }));
        assert_eq!(delta.objects[0].initial_state.position, [1.5, 0.0, 2.0]);
    }

    #[test]
    fn wrong_arity_falls_back_to_default() {
        let world = normalize_world(&json!({"environment": {"gravity": [0.0, -9.81]}}));
        assert_eq!(world.environment.gravity, DEFAULT_GRAVITY);
    }

    #[test]
    fn mass_defaults_when_null() {
        let delta = normalize_delta(&json!({
            "objects": [{"id": "ball1", "initial_state": {"mass": null}}]
        }));
        assert_eq!(delta.objects[0].initial_state.mass, DEFAULT_OBJECT_MASS);
    }

    #[test]
    fn angular_velocity_is_never_invented() {
        let delta = normalize_delta(&json!({"objects": [{"id": "ball1"}]}));
        assert_eq!(delta.objects[0].initial_state.angular_velocity, None);

        let delta = normalize_delta(&json!({
            "objects": [{"id": "ball1", "initial_state": {"angular_velocity": [1, 2]}}]
        }));
        assert_eq!(
            delta.objects[0].initial_state.angular_velocity,
            Some([0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn environment_defaults_fill_missing_fields() {
        let world = normalize_world(&json!({"environment": {"temperature": 310.0}}));
        let env = world.environment;
        assert_eq!(env.temperature, 310.0);
        assert_eq!(env.gravity, [0.0, 0.0, -9.81]);
        assert_eq!(env.wind, Wind::default());
        assert_eq!(env.pressure, 101_325.0);
        assert_eq!(env.air_density, 1.225);
        assert_eq!(env.drag_coefficient, 0.47);
        assert_eq!(env.humidity, 0.5);
        assert_eq!(env.time_step, 0.01);
        assert_eq!(env.duration, 5.0);
    }

    #[test]
    fn non_positive_time_step_is_replaced() {
        let world = normalize_world(&json!({
            "environment": {"time_step": 0.0, "duration": -1.0, "wind": {"strength": -3.0}}
        }));
        assert_eq!(world.environment.time_step, DEFAULT_TIME_STEP);
        assert_eq!(world.environment.duration, DEFAULT_DURATION);
        assert_eq!(world.environment.wind.strength, 0.0);
    }

    #[test]
    fn missing_actions_become_empty() {
        let delta = normalize_delta(&json!({"objects": []}));
        assert!(delta.actions.is_empty());
        let delta = normalize_delta(&json!({"actions": null}));
        assert!(delta.actions.is_empty());
    }

    #[test]
    fn action_defaults_and_case_folding() {
        let delta = normalize_delta(&json!({
            "actions": [{"target_id": "ball1", "type": "THROW"}]
        }));
        let action = &delta.actions[0];
        assert_eq!(action.kind, ActionKind::Throw);
        assert_eq!(action.magnitude, 1.0);
        assert_eq!(action.direction, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_environment_block_counts_as_absent() {
        assert_eq!(normalize_delta(&json!({"environment": {}})).environment, None);
        assert!(normalize_delta(&json!({"environment": {"duration": 2}}))
            .environment
            .is_some());
    }

    #[test]
    fn objects_without_id_are_dropped() {
        let delta = normalize_delta(&json!({"objects": [{"type": "ball"}, {"id": 7}, "x"]}));
        assert!(delta.objects.is_empty());
    }

    #[test]
    fn sphere_alias_and_nested_properties() {
        let delta = normalize_delta(&json!({
            "objects": [{"id": "b", "type": "sphere", "properties": {"radius": 0.2, "restitution": 0.8}}]
        }));
        let object = &delta.objects[0];
        assert_eq!(object.kind, ObjectKind::Ball);
        assert_eq!(object.radius, Some(0.2));
        assert_eq!(object.restitution, Some(0.8));
    }

    #[test]
    fn normalization_is_idempotent() {
        let world = normalize_world(&json!({
            "objects": [
                {"id": "ball1", "type": "ball", "restitution": 0.7,
                 "initial_state": {"position": [0, null, 1], "angular_velocity": [0, 1, 0]}},
                {"id": "table1", "type": "table", "static": true, "size": [1, 1, 0.8]}
            ],
            "environment": {"gravity": "down", "wind": {"direction": [1, 0, 0], "strength": 2}},
            "actions": [{"target_id": "ball1", "type": "wobble", "magnitude": 3}]
        }));
        let again = normalize_world(&serde_json::to_value(&world).unwrap());
        assert_eq!(again, world);
    }

    #[test]
    fn document_load_collapses_duplicate_ids() {
        let document = normalize_document(&json!({
            "objects": [
                {"id": "ball1", "initial_state": {"position": [0, 0, 1]}},
                {"id": "ball1", "initial_state": {"position": [0, 0, 2]}}
            ],
            "environment": {}
        }));
        assert_eq!(document.objects.len(), 1);
        assert_eq!(document.objects[0].initial_state.position, [0.0, 0.0, 2.0]);
        assert_eq!(document.environment, None);
    }
}
