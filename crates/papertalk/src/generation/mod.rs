//! Language model backends implementing [`papertalk_core::synth::Generator`].
//!
//! Both backends send the request as a chat: the grounding instruction as
//! the system message, earlier turns as user/assistant pairs, then the
//! rendered prompt (see [`GenerateRequest::messages`]).
//!
//! | Config Value | Backend | Endpoint | Default model |
//! |-------------|---------|----------|---------------|
//! | `"openai"` | [`OpenAIGenerator`] | `POST /v1/chat/completions` | `gpt-3.5-turbo` |
//! | `"ollama"` | [`OllamaGenerator`] | `POST /api/chat` | `gemma3:1b` |
//! | `"disabled"` | [`DisabledGenerator`] | none | none |

use anyhow::{bail, Result};
use async_trait::async_trait;
use papertalk_core::synth::{GenerateRequest, Generator};
use papertalk_core::PipelineError;

use crate::config::GenerationConfig;
use crate::embedding::DEFAULT_OLLAMA_URL;
use crate::http::{join_url, JsonEndpoint};

pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OLLAMA_CHAT_MODEL: &str = "gemma3:1b";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

fn synthesis_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Synthesis(e.to_string())
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _request: &GenerateRequest<'_>) -> papertalk_core::Result<String> {
        Err(synthesis_error("generation provider is disabled"))
    }
}

/// OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    model: String,
    temperature: f32,
    endpoint: JsonEndpoint,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_CHAT_MODEL.to_string()),
            temperature: config.temperature,
            endpoint: JsonEndpoint::new(
                "OpenAI",
                join_url(base, "/v1/chat/completions"),
                Some(api_key),
                config.timeout_secs,
                config.max_retries,
            )?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest<'_>) -> papertalk_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages(),
            "temperature": self.temperature,
        });
        let json = self.endpoint.post(&body).await.map_err(synthesis_error)?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> papertalk_core::Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| synthesis_error("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Ollama chat, non-streaming.
pub struct OllamaGenerator {
    model: String,
    temperature: f32,
    endpoint: JsonEndpoint,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_CHAT_MODEL.to_string()),
            temperature: config.temperature,
            endpoint: JsonEndpoint::new(
                "Ollama",
                join_url(base, "/api/chat"),
                None,
                config.timeout_secs,
                config.max_retries,
            )?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest<'_>) -> papertalk_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages(),
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        tracing::debug!(url = self.endpoint.url(), model = %self.model, "ollama chat");
        let json = self.endpoint.post(&body).await.map_err(synthesis_error)?;
        parse_ollama_chat(&json)
    }
}

fn parse_ollama_chat(json: &serde_json::Value) -> papertalk_core::Result<String> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(synthesis_error(format!("Ollama error: {}", err)));
    }
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| synthesis_error("Invalid Ollama response: missing message.content"))
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
