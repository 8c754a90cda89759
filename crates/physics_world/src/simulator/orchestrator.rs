//! One conversational turn: interpret → normalize → map actions → merge →
//! validate → simulate → ingest → report.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::engine::{PhysicsEngine, SimulationError, SimulationOptions, SimulationOutcome};
use super::interpreter::{InterpretError, WorldInterpreter};
use super::memory::WorldMemory;
use super::motion::{resolve_actions, ActionResolution};
use super::normalize::normalize_delta;
use super::report::summarize;
use super::types::ObjectId;
use super::validate::{StructuralValidator, ValidationError, WorldValidator};
use super::world_model::{World, WorldDelta, WorldDocument};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnError {
    #[error("interpretation failed: {0}")]
    Interpret(#[from] InterpretError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    /// Normalized draft after action deltas were applied.
    pub draft: WorldDelta,
    pub resolution: ActionResolution,
    /// The world that was handed to the engine.
    pub world: World,
    pub outcome: SimulationOutcome,
    pub summary: BTreeMap<ObjectId, String>,
}

/// Owns the world memory for the process lifetime and drives turns through
/// the interpreter and the physics engine.
#[derive(Debug)]
pub struct TurnOrchestrator<I, E, V = StructuralValidator> {
    interpreter: I,
    engine: E,
    validator: V,
    memory: WorldMemory,
    options: SimulationOptions,
}

impl<I, E> TurnOrchestrator<I, E, StructuralValidator>
where
    I: WorldInterpreter,
    E: PhysicsEngine,
{
    pub fn new(interpreter: I, engine: E, memory: WorldMemory) -> Self {
        Self::with_validator(interpreter, engine, StructuralValidator, memory)
    }
}

impl<I, E, V> TurnOrchestrator<I, E, V>
where
    I: WorldInterpreter,
    E: PhysicsEngine,
    V: WorldValidator,
{
    pub fn with_validator(interpreter: I, engine: E, validator: V, memory: WorldMemory) -> Self {
        Self {
            interpreter,
            engine,
            validator,
            memory,
            options: SimulationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn memory(&self) -> &WorldMemory {
        &self.memory
    }

    pub fn state(&self) -> &WorldDocument {
        self.memory.state()
    }

    pub fn interpreter_mut(&mut self) -> &mut I {
        &mut self.interpreter
    }

    pub fn reset(&mut self) {
        self.memory.reset();
    }

    /// Runs one turn. A validation failure leaves memory untouched; a
    /// simulation failure leaves the merged draft in memory.
    #[instrument(skip(self, user_text), fields(text_len = user_text.len()))]
    pub fn run_turn(&mut self, user_text: &str) -> Result<TurnReport, TurnError> {
        let context = self.memory.state().clone();
        let context_arg = (!context.is_empty()).then_some(&context);

        let raw = self.interpreter.interpret(user_text, context_arg)?;
        let raw = if raw.is_object() {
            raw
        } else {
            warn!("interpreter draft is not a JSON object, using empty draft");
            Value::Object(Map::new())
        };

        let mut draft = normalize_delta(&raw);
        let resolution = resolve_actions(&mut draft, &context.environment_or_default());

        let staged = self.memory.preview_merge(&draft);
        let world = staged.to_world(draft.actions.clone());
        if let Err(err) = self.validator.validate(&world) {
            warn!(issues = err.issues.len(), "merged world rejected by validation");
            return Err(err.into());
        }
        self.memory.merge(&draft);

        let outcome = self.engine.simulate(&world, &self.options)?;
        self.memory.replace(outcome.final_state.clone());
        let summary = summarize(&outcome);

        info!(
            objects = world.objects.len(),
            actions_applied = resolution.applied.len(),
            actions_dropped = resolution.unresolved.len(),
            steps = outcome.steps,
            "turn finished"
        );

        Ok(TurnReport {
            draft,
            resolution,
            world,
            outcome,
            summary,
        })
    }
}
