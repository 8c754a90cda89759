//! Conversational world simulator.
//!
//! This module is organized into submodules:
//! - `types`: IDs, defaults, object and action kinds
//! - `world_model`: objects, environment, actions, and document shapes
//! - `normalize`: loosely typed JSON → typed documents with defaults
//! - `motion`: semantic actions → physics deltas
//! - `memory`: the persistent canonical world document
//! - `persist`: JSON file helpers
//! - `validate`: structural checks before simulation
//! - `interpreter`: natural language → world draft via an LLM
//! - `engine`: physics engine seam and the point-mass integrator
//! - `report`: per-object summaries
//! - `orchestrator`: the turn cycle
//! - `config`: TOML/env configuration

mod config;
mod engine;
mod interpreter;
mod memory;
mod motion;
mod normalize;
mod orchestrator;
mod persist;
mod report;
mod types;
mod validate;
mod world_model;

#[cfg(test)]
mod tests;

pub use config::{
    ConfigError, LlmConfig, SessionConfig, WorldChatConfig, DEFAULT_CONFIG_FILE_NAME,
    DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_LLM_SYSTEM_PROMPT, DEFAULT_LLM_TEMPERATURE,
    DEFAULT_LLM_TIMEOUT_MS, ENV_LLM_API_KEY, ENV_LLM_BASE_URL, ENV_LLM_MODEL,
    ENV_LLM_SYSTEM_PROMPT, ENV_LLM_TEMPERATURE, ENV_LLM_TIMEOUT_MS, ENV_MAX_STEPS,
    ENV_MEMORY_PATH, ENV_REALTIME,
};
pub use engine::{
    PhysicsEngine, PointMassEngine, Scene, SimulationError, SimulationOptions, SimulationOutcome,
    Trajectory, TrajectorySample, DEFAULT_MAX_STEPS,
};
pub use interpreter::{
    parse_world_draft, ChatMessage, InterpretError, InterpretTrace, InterpreterBuildError,
    LlmCompletionClient, LlmCompletionRequest, LlmCompletionResult, LlmInterpreter,
    OpenAiChatCompletionClient, WorldInterpreter,
};
pub use memory::WorldMemory;
pub use motion::{
    map_action, resolve_actions, ActionResolution, AppliedAction, EnvironmentOverride,
    PhysicsDelta,
};
pub use normalize::{
    normalize_action, normalize_delta, normalize_document, normalize_environment,
    normalize_object, normalize_world,
};
pub use orchestrator::{TurnError, TurnOrchestrator, TurnReport};
pub use persist::PersistError;
pub use report::summarize;
pub use types::{
    ActionKind, ObjectId, ObjectKind, DEFAULT_ACTION_MAGNITUDE, DEFAULT_AIR_DENSITY,
    DEFAULT_CROSS_SECTION, DEFAULT_DRAG_COEFFICIENT, DEFAULT_DURATION, DEFAULT_GRAVITY,
    DEFAULT_HUMIDITY, DEFAULT_MEMORY_PATH, DEFAULT_OBJECT_MASS, DEFAULT_PRESSURE_PA,
    DEFAULT_TEMPERATURE_K, DEFAULT_TIME_STEP,
};
pub use validate::{StructuralValidator, ValidationError, ValidationIssue, WorldValidator};
pub use world_model::{
    Action, Environment, InitialState, Wind, World, WorldDelta, WorldDocument, WorldObject,
};
