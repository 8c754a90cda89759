//! Natural-language interpreter backed by an OpenAI-compatible
//! chat-completion endpoint.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::config::{ConfigError, LlmConfig, WorldChatConfig};
use super::world_model::WorldDocument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    #[error("client build failed: {message}")]
    BuildClient { message: String },
    #[error("http request failed: {message}")]
    Http { message: String },
    #[error("http status {code}: {message}")]
    HttpStatus { code: u16, message: String },
    #[error("decode response failed: {message}")]
    DecodeResponse { message: String },
    #[error("empty completion choice")]
    EmptyChoice,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpreterBuildError {
    #[error("llm config error: {0}")]
    Config(#[from] ConfigError),
    #[error("llm client error: {0}")]
    Client(#[from] InterpretError),
}

/// Turns free text plus the current world into a draft world delta.
pub trait WorldInterpreter {
    /// `context` carries no actions, so the interpreter can only propose new
    /// ones. Malformed model output is reported as an empty JSON object, not
    /// as an error.
    fn interpret(
        &mut self,
        user_text: &str,
        context: Option<&WorldDocument>,
    ) -> Result<Value, InterpretError>;
}

// ============================================================================
// Completion client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCompletionResult {
    pub output: String,
    pub model: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

pub trait LlmCompletionClient {
    fn complete(&self, request: &LlmCompletionRequest)
        -> Result<LlmCompletionResult, InterpretError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChatCompletionClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiChatCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, InterpretError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|err| InterpretError::BuildClient {
                message: err.to_string(),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmCompletionClient for OpenAiChatCompletionClient {
    fn complete(
        &self,
        request: &LlmCompletionRequest,
    ) -> Result<LlmCompletionResult, InterpretError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model: request.model.as_str(),
            temperature: request.temperature,
            messages: &request.messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| InterpretError::Http {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(InterpretError::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }

        let response: ChatCompletionResponse =
            response
                .json()
                .map_err(|err| InterpretError::DecodeResponse {
                    message: err.to_string(),
                })?;

        let model = response.model;
        let usage = response.usage;
        let first = response
            .choices
            .into_iter()
            .next()
            .ok_or(InterpretError::EmptyChoice)?;

        Ok(LlmCompletionResult {
            output: first.message.content.unwrap_or_default(),
            model,
            prompt_tokens: usage.as_ref().and_then(|usage| usage.prompt_tokens),
            completion_tokens: usage.as_ref().and_then(|usage| usage.completion_tokens),
            total_tokens: usage.as_ref().and_then(|usage| usage.total_tokens),
        })
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// Record of the last interpreter exchange, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpretTrace {
    pub llm_input: String,
    pub llm_output: Option<String>,
    pub llm_error: Option<String>,
    pub parse_error: Option<String>,
    pub model: Option<String>,
    pub latency_ms: u64,
    pub total_tokens: Option<u64>,
}

#[derive(Debug)]
pub struct LlmInterpreter<C: LlmCompletionClient> {
    config: LlmConfig,
    client: C,
    last_trace: Option<InterpretTrace>,
}

impl LlmInterpreter<OpenAiChatCompletionClient> {
    pub fn from_env() -> Result<Self, InterpreterBuildError> {
        let config = WorldChatConfig::from_default_sources()?;
        Self::from_config(config.llm)
    }

    pub fn from_config(config: LlmConfig) -> Result<Self, InterpreterBuildError> {
        let client = OpenAiChatCompletionClient::from_config(&config)?;
        Ok(Self::new(config, client))
    }
}

impl<C: LlmCompletionClient> LlmInterpreter<C> {
    pub fn new(config: LlmConfig, client: C) -> Self {
        Self {
            config,
            client,
            last_trace: None,
        }
    }

    pub fn take_trace(&mut self) -> Option<InterpretTrace> {
        self.last_trace.take()
    }

    fn messages(&self, user_text: &str, context: Option<&WorldDocument>) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.config.system_prompt.as_str())];
        if let Some(context) = context {
            let context_json = serde_json::to_string_pretty(context)
                .unwrap_or_else(|_| "{\"error\":\"world serialize failed\"}".to_string());
            messages.push(ChatMessage::system(format!(
                "The current world state is:\n{context_json}\n\nApply the next instruction on top of this state."
            )));
        }
        messages.push(ChatMessage::user(user_text));
        messages
    }

    fn trace_input(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .map(|message| format!("[{}]\n{}", message.role, message.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl<C: LlmCompletionClient> WorldInterpreter for LlmInterpreter<C> {
    fn interpret(
        &mut self,
        user_text: &str,
        context: Option<&WorldDocument>,
    ) -> Result<Value, InterpretError> {
        let request = LlmCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            messages: self.messages(user_text, context),
        };
        let llm_input = Self::trace_input(&request.messages);

        let started_at = Instant::now();
        let result = self.client.complete(&request);
        let latency_ms = started_at.elapsed().as_millis() as u64;

        match result {
            Ok(completion) => {
                let (draft, parse_error) = parse_world_draft(completion.output.as_str());
                if let Some(parse_error) = &parse_error {
                    warn!(error = %parse_error, "interpreter output malformed, using empty draft");
                }
                debug!(latency_ms, tokens = ?completion.total_tokens, "interpreter replied");
                self.last_trace = Some(InterpretTrace {
                    llm_input,
                    llm_output: Some(completion.output),
                    llm_error: None,
                    parse_error,
                    model: completion.model.or(Some(request.model)),
                    latency_ms,
                    total_tokens: completion.total_tokens,
                });
                Ok(draft)
            }
            Err(err) => {
                self.last_trace = Some(InterpretTrace {
                    llm_input,
                    llm_output: None,
                    llm_error: Some(err.to_string()),
                    parse_error: None,
                    model: Some(request.model),
                    latency_ms,
                    total_tokens: None,
                });
                Err(err)
            }
        }
    }
}

/// Parses model output into a JSON object. Anything that is not an object
/// becomes `{}` together with the reason.
pub fn parse_world_draft(output: &str) -> (Value, Option<String>) {
    let json = extract_json_block(output).unwrap_or(output);
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => (Value::Object(map), None),
        Ok(other) => (
            Value::Object(Map::new()),
            Some(format!("expected a JSON object, got {}", json_kind(&other))),
        ),
        Err(err) => (
            Value::Object(Map::new()),
            Some(format!("json parse failed: {err}")),
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn extract_json_block(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    raw.get(start..=end)
}
