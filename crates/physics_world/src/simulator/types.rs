//! Core type definitions: IDs, defaults, and the object/action enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Vec3;

// ============================================================================
// Type Aliases
// ============================================================================

pub type ObjectId = String;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_GRAVITY: Vec3 = [0.0, 0.0, -9.81];
pub const DEFAULT_TEMPERATURE_K: f64 = 298.0;
pub const DEFAULT_PRESSURE_PA: f64 = 101_325.0;
pub const DEFAULT_AIR_DENSITY: f64 = 1.225;
pub const DEFAULT_DRAG_COEFFICIENT: f64 = 0.47;
pub const DEFAULT_HUMIDITY: f64 = 0.5;
pub const DEFAULT_TIME_STEP: f64 = 0.01;
pub const DEFAULT_DURATION: f64 = 5.0;

pub const DEFAULT_OBJECT_MASS: f64 = 1.0;
/// Frontal area of a sphere with radius ≈ 0.1 m.
pub const DEFAULT_CROSS_SECTION: f64 = 0.0314;
pub const MIN_CROSS_SECTION: f64 = 1e-6;
pub const DEFAULT_ACTION_MAGNITUDE: f64 = 1.0;

pub const DEFAULT_MEMORY_PATH: &str = "data/world_state.json";

// ============================================================================
// Object Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Ball,
    Box,
    Plane,
    Table,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Ball => "ball",
            ObjectKind::Box => "box",
            ObjectKind::Plane => "plane",
            ObjectKind::Table => "table",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "ball" | "sphere" => Some(ObjectKind::Ball),
            "box" | "cube" => Some(ObjectKind::Box),
            "plane" | "ground" | "floor" => Some(ObjectKind::Plane),
            "table" => Some(ObjectKind::Table),
            _ => None,
        }
    }
}

// ============================================================================
// Action Kind
// ============================================================================

/// Semantic verb carried by an action. Unknown verbs are preserved verbatim so
/// they survive a serialize/normalize cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Throw,
    Roll,
    Stop,
    Vacuum,
    Drop,
    Bounce,
    Lift,
    Collide,
    Push,
    ApplyForce,
    Other(String),
}

impl ActionKind {
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "throw" => ActionKind::Throw,
            "roll" => ActionKind::Roll,
            "stop" => ActionKind::Stop,
            "vacuum" => ActionKind::Vacuum,
            "drop" => ActionKind::Drop,
            "bounce" => ActionKind::Bounce,
            "lift" => ActionKind::Lift,
            "collide" => ActionKind::Collide,
            "push" => ActionKind::Push,
            "apply_force" => ActionKind::ApplyForce,
            _ => ActionKind::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Throw => "throw",
            ActionKind::Roll => "roll",
            ActionKind::Stop => "stop",
            ActionKind::Vacuum => "vacuum",
            ActionKind::Drop => "drop",
            ActionKind::Bounce => "bounce",
            ActionKind::Lift => "lift",
            ActionKind::Collide => "collide",
            ActionKind::Push => "push",
            ActionKind::ApplyForce => "apply_force",
            ActionKind::Other(raw) => raw.as_str(),
        }
    }

    /// Impulse-style actions are left to the physics engine.
    pub fn is_impulse(&self) -> bool {
        matches!(self, ActionKind::Push | ActionKind::ApplyForce)
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        ActionKind::parse(&value)
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_kind_accepts_aliases() {
        assert_eq!(ObjectKind::parse("Sphere"), Some(ObjectKind::Ball));
        assert_eq!(ObjectKind::parse("cube"), Some(ObjectKind::Box));
        assert_eq!(ObjectKind::parse("ground"), Some(ObjectKind::Plane));
        assert_eq!(ObjectKind::parse(" FLOOR "), Some(ObjectKind::Plane));
        assert_eq!(ObjectKind::parse("pyramid"), None);
    }

    #[test]
    fn unknown_action_verbs_are_kept_lowercased() {
        assert_eq!(ActionKind::parse("Throw"), ActionKind::Throw);
        assert_eq!(
            ActionKind::parse("Spin"),
            ActionKind::Other("spin".to_string())
        );
    }
}
