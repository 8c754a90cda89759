//! World memory: the single canonical world document that accumulates across
//! turns and is mirrored to a JSON file after every mutation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::normalize::normalize_document;
use super::persist::{read_json_value, remove_file_if_exists, write_json_to_path, PersistError};
use super::world_model::{WorldDelta, WorldDocument, WorldObject};

/// Keyed upsert by `id`: a matching object is replaced wholesale in place,
/// unknown ids are appended, everything else is left untouched.
pub(crate) fn upsert_objects(existing: &mut Vec<WorldObject>, incoming: Vec<WorldObject>) {
    for object in incoming {
        match existing.iter_mut().find(|current| current.id == object.id) {
            Some(slot) => *slot = object,
            None => existing.push(object),
        }
    }
}

#[derive(Debug)]
pub struct WorldMemory {
    path: PathBuf,
    state: WorldDocument,
}

impl WorldMemory {
    /// Loads the document stored at `path`, or starts empty and writes the
    /// empty document when nothing usable is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.exists() {
            match read_json_value(&path) {
                Ok(raw) => {
                    let state = normalize_document(&raw);
                    info!(
                        path = %path.display(),
                        objects = state.objects.len(),
                        "world memory loaded"
                    );
                    return Self { path, state };
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "world memory unreadable, starting empty");
                }
            }
        }
        let memory = Self {
            path,
            state: WorldDocument::empty(),
        };
        memory.save();
        memory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &WorldDocument {
        &self.state
    }

    /// The merge result for `delta` without touching the stored state.
    pub fn preview_merge(&self, delta: &WorldDelta) -> WorldDocument {
        let mut next = self.state.clone();
        upsert_objects(&mut next.objects, delta.objects.clone());
        if let Some(environment) = &delta.environment {
            next.environment = Some(environment.clone());
        }
        next
    }

    /// Merges `delta` into the canonical state and persists it. Actions in the
    /// delta are ignored.
    pub fn merge(&mut self, delta: &WorldDelta) -> &WorldDocument {
        let next = self.preview_merge(delta);
        debug!(
            incoming = delta.objects.len(),
            total = next.objects.len(),
            environment_replaced = delta.environment.is_some(),
            "world memory merged"
        );
        self.commit(next)
    }

    /// Replaces the canonical state wholesale, e.g. with a simulation result.
    pub fn replace(&mut self, document: WorldDocument) -> &WorldDocument {
        let mut objects = Vec::with_capacity(document.objects.len());
        upsert_objects(&mut objects, document.objects);
        self.commit(WorldDocument {
            objects,
            environment: document.environment,
        })
    }

    pub fn reset(&mut self) {
        self.state = WorldDocument::empty();
        match remove_file_if_exists(&self.path) {
            Ok(true) => info!(path = %self.path.display(), "world memory file removed"),
            Ok(false) => debug!(path = %self.path.display(), "no world memory file to remove"),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "world memory file could not be removed")
            }
        }
    }

    fn commit(&mut self, next: WorldDocument) -> &WorldDocument {
        self.state = next;
        self.save();
        &self.state
    }

    pub fn try_save(&self) -> Result<(), PersistError> {
        write_json_to_path(&self.state, &self.path)
    }

    fn save(&self) {
        if let Err(err) = self.try_save() {
            warn!(path = %self.path.display(), error = %err, "world memory could not be persisted");
        }
    }
}
