//! Persistence utilities: JSON file helpers and error types.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serde error: {0}")]
    Serde(String),
}

impl From<io::Error> for PersistError {
    fn from(err: io::Error) -> Self {
        PersistError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Serde(err.to_string())
    }
}

/// Writes `value` as pretty JSON, creating parent directories as needed. The
/// document is written to a sibling temp file first and renamed into place.
pub(crate) fn write_json_to_path<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    fs::write(tmp_path, data)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Reads a file as untyped JSON so the caller can run it through the
/// normalizer.
pub(crate) fn read_json_value(path: &Path) -> Result<Value, PersistError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

pub(crate) fn remove_file_if_exists(path: &Path) -> Result<bool, PersistError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        write_json_to_path(&json!({"objects": []}), &path).unwrap();
        assert_eq!(read_json_value(&path).unwrap(), json!({"objects": []}));
    }

    #[test]
    fn read_reports_serde_error_for_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_json_value(&path), Err(PersistError::Serde(_))));
    }

    #[test]
    fn remove_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(remove_file_if_exists(&path), Ok(false));
    }
}
