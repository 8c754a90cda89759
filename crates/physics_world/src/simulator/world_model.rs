//! World entities: WorldObject, Environment, Action, and the document shapes
//! exchanged between the interpreter, memory, and the physics engine.

use serde::{Deserialize, Serialize};

use super::types::{
    ActionKind, ObjectId, ObjectKind, DEFAULT_ACTION_MAGNITUDE, DEFAULT_AIR_DENSITY,
    DEFAULT_CROSS_SECTION, DEFAULT_DRAG_COEFFICIENT, DEFAULT_DURATION, DEFAULT_GRAVITY,
    DEFAULT_HUMIDITY, DEFAULT_OBJECT_MASS, DEFAULT_PRESSURE_PA, DEFAULT_TEMPERATURE_K,
    DEFAULT_TIME_STEP, MIN_CROSS_SECTION,
};
use crate::geometry::{Quat, Vec3, IDENTITY_QUAT, ZERO_VEC3};

// ============================================================================
// World Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub position: Vec3,
    pub velocity: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<Vec3>,
    pub orientation: Quat,
    pub mass: f64,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            position: ZERO_VEC3,
            velocity: ZERO_VEC3,
            angular_velocity: None,
            orientation: IDENTITY_QUAT,
            mass: DEFAULT_OBJECT_MASS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: ObjectId,
    #[serde(rename = "type", default)]
    pub kind: ObjectKind,
    #[serde(rename = "static", default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restitution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_friction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_section: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Full extents along x, y, z for boxes and tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec3>,
    #[serde(default)]
    pub initial_state: InitialState,
}

impl WorldObject {
    pub fn new(id: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            kind,
            is_static: false,
            mass: None,
            restitution: None,
            friction: None,
            rolling_friction: None,
            cross_section: None,
            radius: None,
            size: None,
            initial_state: InitialState::default(),
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.initial_state.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.initial_state.velocity = velocity;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn cross_section_or_default(&self) -> f64 {
        self.cross_section.unwrap_or(DEFAULT_CROSS_SECTION)
    }

    /// Radius of the sphere whose frontal area equals the cross section.
    pub fn effective_radius(&self) -> f64 {
        (self.cross_section_or_default().max(MIN_CROSS_SECTION) / std::f64::consts::PI).sqrt()
    }

    /// Planes are ground surfaces and never move.
    pub fn is_immovable(&self) -> bool {
        self.is_static || self.kind == ObjectKind::Plane
    }

    /// Mass used for dynamics: the explicit property wins over the initial
    /// state value.
    pub fn dynamic_mass(&self) -> f64 {
        self.mass.unwrap_or(self.initial_state.mass)
    }
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub direction: Vec3,
    pub strength: f64,
}

impl Default for Wind {
    fn default() -> Self {
        Self {
            direction: ZERO_VEC3,
            strength: 0.0,
        }
    }
}

impl Wind {
    pub fn velocity(&self) -> Vec3 {
        crate::geometry::vec3_scale(self.direction, self.strength)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub gravity: Vec3,
    pub wind: Wind,
    pub temperature: f64,
    pub pressure: f64,
    pub air_density: f64,
    pub drag_coefficient: f64,
    pub humidity: f64,
    pub time_step: f64,
    pub duration: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            wind: Wind::default(),
            temperature: DEFAULT_TEMPERATURE_K,
            pressure: DEFAULT_PRESSURE_PA,
            air_density: DEFAULT_AIR_DENSITY,
            drag_coefficient: DEFAULT_DRAG_COEFFICIENT,
            humidity: DEFAULT_HUMIDITY,
            time_step: DEFAULT_TIME_STEP,
            duration: DEFAULT_DURATION,
        }
    }
}

impl Environment {
    pub fn is_vacuum(&self) -> bool {
        self.air_density == 0.0 && self.drag_coefficient == 0.0
    }

    /// Number of discrete integration steps covering `duration`.
    pub fn step_count(&self) -> u64 {
        if self.time_step <= 0.0 || !self.time_step.is_finite() || !self.duration.is_finite() {
            return 0;
        }
        // Guard against 5.0 / 0.01 landing on 499.999...
        let ratio = self.duration / self.time_step;
        (ratio + 1e-9).floor().max(0.0) as u64
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub target_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub magnitude: f64,
    pub direction: Vec3,
}

impl Action {
    pub fn new(target_id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            target_id: target_id.into(),
            kind,
            magnitude: DEFAULT_ACTION_MAGNITUDE,
            direction: ZERO_VEC3,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Fully normalized world handed to validation and the physics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct World {
    pub objects: Vec<WorldObject>,
    pub environment: Environment,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl World {
    pub fn object(&self, id: &str) -> Option<&WorldObject> {
        self.objects.iter().find(|object| object.id == id)
    }
}

/// Normalized draft produced from interpreter output. `environment` is `None`
/// when the draft did not mention the environment at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldDelta {
    pub objects: Vec<WorldObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl WorldDelta {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.environment.is_none() && self.actions.is_empty()
    }
}

/// Canonical memory document. It never carries actions; an unset environment
/// is stored as `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldDocument {
    pub objects: Vec<WorldObject>,
    #[serde(default, with = "optional_environment")]
    pub environment: Option<Environment>,
}

impl WorldDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.environment.is_none()
    }

    pub fn object(&self, id: &str) -> Option<&WorldObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn environment_or_default(&self) -> Environment {
        self.environment.clone().unwrap_or_default()
    }

    pub fn to_world(&self, actions: Vec<Action>) -> World {
        World {
            objects: self.objects.clone(),
            environment: self.environment_or_default(),
            actions,
        }
    }
}

impl From<World> for WorldDocument {
    fn from(world: World) -> Self {
        Self {
            objects: world.objects,
            environment: Some(world.environment),
        }
    }
}

mod optional_environment {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Environment;

    pub fn serialize<S>(value: &Option<Environment>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(environment) => environment.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Environment>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(map) if map.is_empty() => Ok(None),
            other => serde_json::from_value(other)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}
