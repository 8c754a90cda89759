pub mod geometry;
pub mod simulator;

pub use geometry::{Quat, Vec3, IDENTITY_QUAT, ZERO_VEC3};

// Turn cycle
pub use simulator::{TurnError, TurnOrchestrator, TurnReport};

// World documents
pub use simulator::{
    Action, ActionKind, Environment, InitialState, ObjectKind, Wind, World, WorldDelta,
    WorldDocument, WorldObject,
};

// Normalization, action mapping, memory
pub use simulator::{
    map_action, normalize_delta, normalize_document, normalize_world, resolve_actions,
    ActionResolution, PhysicsDelta, WorldMemory,
};

// Collaborators
pub use simulator::{
    summarize, LlmInterpreter, PhysicsEngine, PointMassEngine, SimulationOptions,
    SimulationOutcome, StructuralValidator, WorldChatConfig, WorldInterpreter, WorldValidator,
};
