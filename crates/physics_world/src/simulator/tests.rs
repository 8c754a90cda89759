//! Turn-cycle tests for the simulator module.

use super::*;
use serde_json::{json, Value};
use std::collections::VecDeque;

/// Replays canned drafts and records the context it was shown.
#[derive(Debug, Default)]
struct ScriptedInterpreter {
    replies: VecDeque<Result<Value, InterpretError>>,
    contexts: Vec<Option<WorldDocument>>,
}

impl ScriptedInterpreter {
    fn new(replies: Vec<Result<Value, InterpretError>>) -> Self {
        Self {
            replies: replies.into(),
            contexts: Vec::new(),
        }
    }
}

impl WorldInterpreter for ScriptedInterpreter {
    fn interpret(
        &mut self,
        _user_text: &str,
        context: Option<&WorldDocument>,
    ) -> Result<Value, InterpretError> {
        self.contexts.push(context.cloned());
        self.replies.pop_front().unwrap_or_else(|| Ok(json!({})))
    }
}

#[derive(Debug, Default)]
struct FailingEngine;

impl PhysicsEngine for FailingEngine {
    fn simulate(
        &mut self,
        _world: &World,
        _options: &SimulationOptions,
    ) -> Result<SimulationOutcome, SimulationError> {
        Err(SimulationError::InvalidTimeStep { time_step: 0.0 })
    }
}

fn orchestrator(
    dir: &tempfile::TempDir,
    replies: Vec<Result<Value, InterpretError>>,
) -> TurnOrchestrator<ScriptedInterpreter, PointMassEngine> {
    let memory = WorldMemory::open(dir.path().join("world_state.json"));
    TurnOrchestrator::new(
        ScriptedInterpreter::new(replies),
        PointMassEngine::default(),
        memory,
    )
}

fn short_environment() -> Value {
    json!({"time_step": 0.01, "duration": 0.05})
}

#[test]
fn two_turns_accumulate_objects() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![
            Ok(json!({
                "objects": [{"id": "ball1", "type": "ball",
                             "initial_state": {"position": [0, 0, 1]}}],
                "environment": {"duration": 0.0}
            })),
            Ok(json!({
                "objects": [{"id": "table1", "type": "table", "static": true,
                             "initial_state": {"position": [3, 0, 0.4]}}]
            })),
        ],
    );

    turns.run_turn("put a ball one metre up").unwrap();
    let ball_after_first = turns.state().object("ball1").cloned().unwrap();
    turns.run_turn("add a table").unwrap();

    let state = turns.state();
    assert_eq!(state.objects.len(), 2);
    assert_eq!(state.object("ball1"), Some(&ball_after_first));
    assert_eq!(
        ball_after_first.initial_state.position,
        [0.0, 0.0, 1.0]
    );
    assert!(state.object("table1").is_some());
}

#[test]
fn first_turn_sends_no_context_and_later_turns_do() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({"objects": [{"id": "ball1"}], "environment": short_environment()}))],
    );
    turns.run_turn("a ball").unwrap();
    turns.run_turn("again").unwrap();

    let contexts = &turns.interpreter_mut().contexts;
    assert_eq!(contexts[0], None);
    let second = contexts[1].as_ref().expect("context after first turn");
    assert!(second.object("ball1").is_some());
}

#[test]
fn throw_action_sets_initial_conditions_before_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1", "initial_state": {"position": [0, 0, 2]}}],
            "environment": {"duration": 0.0},
            "actions": [{"target_id": "ball1", "type": "throw", "magnitude": 2, "direction": [1, 0, 0]}]
        }))],
    );
    let report = turns.run_turn("throw it").unwrap();

    assert_eq!(report.resolution.applied.len(), 1);
    let thrown = report.world.object("ball1").unwrap();
    assert_eq!(thrown.initial_state.velocity, [10.0, 0.0, 0.0]);
    assert_eq!(thrown.initial_state.angular_velocity, Some([0.0, -4.0, 0.0]));
    assert_eq!(thrown.restitution, Some(0.6));
    assert_eq!(report.world.actions.len(), 1);

    // Actions are never persisted.
    let persisted: Value = serde_json::from_str(
        &std::fs::read_to_string(turns.memory().path()).unwrap(),
    )
    .unwrap();
    assert!(persisted.get("actions").is_none());
}

#[test]
fn ghost_target_is_dropped_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1"}],
            "environment": short_environment(),
            "actions": [{"target_id": "ghost", "type": "throw", "direction": [1, 0, 0]}]
        }))],
    );
    let report = turns.run_turn("throw the ghost").unwrap();
    assert!(report.resolution.applied.is_empty());
    assert_eq!(report.resolution.unresolved[0].target_id, "ghost");
    assert_eq!(
        report.draft.objects[0].initial_state.velocity,
        [0.0, 0.0, 0.0]
    );
}

#[test]
fn actions_do_not_resolve_against_memory_objects() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![
            Ok(json!({"objects": [{"id": "ball1"}], "environment": {"duration": 0.0}})),
            Ok(json!({"actions": [{"target_id": "ball1", "type": "lift"}]})),
        ],
    );
    turns.run_turn("a ball").unwrap();
    let report = turns.run_turn("lift it").unwrap();
    assert!(report.resolution.applied.is_empty());
    assert_eq!(
        turns.state().object("ball1").unwrap().initial_state.velocity,
        [0.0, 0.0, 0.0]
    );
}

#[test]
fn vacuum_action_clears_air_and_wind() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1", "initial_state": {"position": [0, 0, 5]}}],
            "environment": {"air_density": 2.0, "drag_coefficient": 1.0, "duration": 0.1,
                            "wind": {"direction": [1, 0, 0], "strength": 5.0}},
            "actions": [{"target_id": "ball1", "type": "vacuum"}]
        }))],
    );
    let report = turns.run_turn("remove the air").unwrap();
    let environment = &report.world.environment;
    assert_eq!(environment.air_density, 0.0);
    assert_eq!(environment.drag_coefficient, 0.0);
    assert_eq!(environment.wind, Wind::default());
    assert_eq!(turns.state().environment.as_ref(), Some(environment));
}

#[test]
fn malformed_draft_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(&dir, vec![Ok(json!("not an object"))]);
    let report = turns.run_turn("gibberish").unwrap();
    assert!(report.draft.is_empty());
    assert!(turns.state().objects.is_empty());
}

#[test]
fn interpreter_error_is_a_turn_error_and_the_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![
            Err(InterpretError::EmptyChoice),
            Ok(json!({"objects": [{"id": "ball1"}], "environment": short_environment()})),
        ],
    );
    assert_eq!(
        turns.run_turn("first").unwrap_err(),
        TurnError::Interpret(InterpretError::EmptyChoice)
    );
    assert!(turns.run_turn("second").is_ok());
    assert!(turns.state().object("ball1").is_some());
}

#[test]
fn validation_failure_leaves_memory_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![
            Ok(json!({"objects": [{"id": "ball1"}], "environment": {"duration": 0.0}})),
            Ok(json!({"objects": [{"id": "ball2", "restitution": 4.0}]})),
        ],
    );
    turns.run_turn("a ball").unwrap();
    let before = turns.state().clone();

    let err = turns.run_turn("a very bouncy ball").unwrap_err();
    assert!(matches!(err, TurnError::Validation(_)));
    assert_eq!(turns.state(), &before);

    let reopened = WorldMemory::open(turns.memory().path());
    assert_eq!(reopened.state(), &before);
}

#[test]
fn simulation_failure_keeps_the_merged_draft() {
    let dir = tempfile::tempdir().unwrap();
    let memory = WorldMemory::open(dir.path().join("world_state.json"));
    let mut turns = TurnOrchestrator::new(
        ScriptedInterpreter::new(vec![Ok(json!({"objects": [{"id": "ball1"}]}))]),
        FailingEngine,
        memory,
    );
    let err = turns.run_turn("a ball").unwrap_err();
    assert!(matches!(err, TurnError::Simulation(_)));
    assert!(turns.state().object("ball1").is_some());
}

#[test]
fn simulation_result_becomes_canonical_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1", "initial_state": {"position": [0, 0, 3]}}],
            "environment": {"duration": 0.2, "air_density": 0, "drag_coefficient": 0}
        }))],
    );
    let report = turns.run_turn("drop from three metres").unwrap();
    let z = turns.state().object("ball1").unwrap().initial_state.position[2];
    assert!(z < 3.0);
    assert_eq!(
        turns.state(),
        &report.outcome.final_state
    );
    assert!(report.summary["ball1"].contains("ball1"));
}

#[test]
fn reset_clears_memory_between_turns() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({"objects": [{"id": "ball1"}], "environment": short_environment()}))],
    );
    turns.run_turn("a ball").unwrap();
    turns.reset();
    assert_eq!(turns.state(), &WorldDocument::empty());
    assert!(!turns.memory().path().exists());
}

#[test]
fn upsert_keeps_latest_version_per_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![
            Ok(json!({"objects": [{"id": "box1", "type": "box", "static": true,
                                   "initial_state": {"position": [0, 0, 1]}}],
                      "environment": {"duration": 0.0}})),
            Ok(json!({"objects": [{"id": "box1", "type": "box", "static": true,
                                   "initial_state": {"position": [5, 0, 1]}}]})),
        ],
    );
    turns.run_turn("a box").unwrap();
    turns.run_turn("move the box").unwrap();
    let boxes: Vec<&WorldObject> = turns
        .state()
        .objects
        .iter()
        .filter(|object| object.id == "box1")
        .collect();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].initial_state.position, [5.0, 0.0, 1.0]);
}

#[test]
fn action_on_duplicated_id_survives_the_merge() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1"}, {"id": "ball1", "initial_state": {"position": [0, 0, 2]}}],
            "environment": {"duration": 0.0},
            "actions": [{"target_id": "ball1", "type": "throw", "magnitude": 2, "direction": [1, 0, 0]}]
        }))],
    );
    turns.run_turn("throw the ball").unwrap();

    let state = turns.state();
    assert_eq!(state.objects.len(), 1);
    let ball = state.object("ball1").unwrap();
    assert_eq!(ball.initial_state.velocity, [10.0, 0.0, 0.0]);
    assert_eq!(ball.restitution, Some(0.6));
}

#[test]
fn enormous_time_step_is_simulated_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut turns = orchestrator(
        &dir,
        vec![Ok(json!({
            "objects": [{"id": "ball1", "initial_state": {"position": [0, 0, 1]}}],
            "environment": {"time_step": 1e30, "duration": 1e30}
        }))],
    );
    let report = turns.run_turn("one enormous step").unwrap();
    assert_eq!(report.outcome.steps, 1);
    assert!(turns.state().object("ball1").is_some());
}
