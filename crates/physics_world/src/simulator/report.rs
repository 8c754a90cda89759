//! Human-readable summaries of a simulation outcome.

use std::collections::BTreeMap;

use super::engine::SimulationOutcome;
use super::types::ObjectId;
use crate::geometry::{vec3_distance, vec3_norm};

/// One line block per object present in the final state, keyed by id.
pub fn summarize(outcome: &SimulationOutcome) -> BTreeMap<ObjectId, String> {
    let mut summaries = BTreeMap::new();
    for object in &outcome.final_state.objects {
        let [x, y, z] = object.initial_state.position;
        let mut text = format!(
            "'{}' ({}): final position (x={x:.2}, y={y:.2}, z={z:.2})",
            object.id,
            object.kind.as_str()
        );
        match outcome.trajectory.get(&object.id) {
            Some(samples) if !samples.is_empty() => {
                let path_length: f64 = samples
                    .windows(2)
                    .map(|pair| vec3_distance(pair[0].position, pair[1].position))
                    .sum();
                let peak = samples
                    .iter()
                    .map(|sample| sample.position[2])
                    .fold(f64::NEG_INFINITY, f64::max);
                let final_speed = vec3_norm(object.initial_state.velocity);
                text.push_str(&format!(
                    "\n  - travelled {path_length:.2} m, peak height {peak:.2} m, final speed {final_speed:.2} m/s"
                ));
            }
            _ if object.is_immovable() => text.push_str("\n  - static"),
            _ => {}
        }
        summaries.insert(object.id.clone(), text);
    }
    summaries
}
