//! Configuration: a flat TOML file keyed by environment-variable names, with
//! the process environment as fallback.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::engine::DEFAULT_MAX_STEPS;
use super::types::DEFAULT_MEMORY_PATH;

pub const ENV_LLM_MODEL: &str = "PHYSICS_WORLD_LLM_MODEL";
pub const ENV_LLM_BASE_URL: &str = "PHYSICS_WORLD_LLM_BASE_URL";
pub const ENV_LLM_API_KEY: &str = "PHYSICS_WORLD_LLM_API_KEY";
pub const ENV_LLM_TIMEOUT_MS: &str = "PHYSICS_WORLD_LLM_TIMEOUT_MS";
pub const ENV_LLM_TEMPERATURE: &str = "PHYSICS_WORLD_LLM_TEMPERATURE";
pub const ENV_LLM_SYSTEM_PROMPT: &str = "PHYSICS_WORLD_LLM_SYSTEM_PROMPT";
pub const ENV_MEMORY_PATH: &str = "PHYSICS_WORLD_MEMORY_PATH";
pub const ENV_REALTIME: &str = "PHYSICS_WORLD_REALTIME";
pub const ENV_MAX_STEPS: &str = "PHYSICS_WORLD_MAX_STEPS";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LLM_TEMPERATURE: f64 = 0.1;

pub const DEFAULT_LLM_SYSTEM_PROMPT: &str = r#"You translate descriptions of physical scenes into world JSON for a physics simulator.
Reply with a single JSON object and nothing else:
{
  "objects": [
    {
      "id": "<stable id, reuse ids from the current world when referring to existing objects>",
      "type": "ball" | "box" | "plane" | "table",
      "static": <bool>,
      "mass": <kg>, "restitution": <0..1>, "friction": <number>, "cross_section": <m^2>, "size": [x, y, z],
      "initial_state": {"position": [x, y, z], "velocity": [x, y, z], "angular_velocity": [x, y, z], "orientation": [x, y, z, w], "mass": <kg>}
    }
  ],
  "environment": {
    "gravity": [0, 0, -9.81], "wind": {"direction": [x, y, z], "strength": <m/s>},
    "temperature": <K>, "pressure": <Pa>, "air_density": <kg/m^3>, "drag_coefficient": <number>,
    "humidity": <0..1>, "time_step": <s>, "duration": <s>
  },
  "actions": [
    {"target_id": "<object id>", "type": "throw" | "roll" | "drop" | "stop" | "vacuum" | "bounce" | "lift" | "collide" | "push" | "apply_force",
     "magnitude": <number>, "direction": [x, y, z]}
  ]
}
The z axis points up and the ground is at z = 0. Only include objects that are new or changed in this turn.
Include "environment" only when the user changes it. Every action target must be listed in "objects" of the same reply."#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing config key: {key}")]
    MissingKey { key: &'static str },
    #[error("empty config key: {key}")]
    EmptyKey { key: &'static str },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("read config file failed ({path}): {message}")]
    ReadConfigFile { path: String, message: String },
    #[error("parse config file failed ({path}): {message}")]
    ParseConfigFile { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub temperature: f64,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub memory_path: PathBuf,
    pub realtime: bool,
    pub max_steps: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
            realtime: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldChatConfig {
    pub llm: LlmConfig,
    pub session: SessionConfig,
}

impl WorldChatConfig {
    pub fn from_default_sources() -> Result<Self, ConfigError> {
        let config_path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_config_file(config_path);
        }
        Self::from_env()
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let table: toml::Table =
            toml::from_str(&content).map_err(|err| ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;

        Self::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_env_with<F>(mut getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_key = required(&mut getter, ENV_LLM_API_KEY)?;
        let model = optional(&mut getter, ENV_LLM_MODEL)
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let base_url = optional(&mut getter, ENV_LLM_BASE_URL)
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let timeout_ms = parsed(&mut getter, ENV_LLM_TIMEOUT_MS, DEFAULT_LLM_TIMEOUT_MS)?;
        let temperature = parsed(&mut getter, ENV_LLM_TEMPERATURE, DEFAULT_LLM_TEMPERATURE)?;
        let system_prompt = optional(&mut getter, ENV_LLM_SYSTEM_PROMPT)
            .unwrap_or_else(|| DEFAULT_LLM_SYSTEM_PROMPT.to_string());

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            memory_path: optional(&mut getter, ENV_MEMORY_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_path),
            realtime: parsed(&mut getter, ENV_REALTIME, defaults.realtime)?,
            max_steps: parsed(&mut getter, ENV_MAX_STEPS, defaults.max_steps)?,
        };

        Ok(Self {
            llm: LlmConfig {
                model,
                base_url,
                api_key,
                timeout_ms,
                temperature,
                system_prompt,
            },
            session,
        })
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn optional<F>(getter: &mut F, key: &str) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    getter(key).filter(|value| !value.trim().is_empty())
}

fn required<F>(getter: &mut F, key: &'static str) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let value = getter(key).ok_or(ConfigError::MissingKey { key })?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyKey { key });
    }
    Ok(value)
}

fn parsed<F, T>(getter: &mut F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match optional(getter, key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
