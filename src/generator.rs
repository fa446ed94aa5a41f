use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeneratorConfig;
use crate::validate::GeneratedPlaylist;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("completion request failed: {0}")]
    Network(String),
    #[error("completion request timed out")]
    Timeout,
    #[error("completion service returned HTTP {0}")]
    Status(u16),
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("completion service returned no text")]
    EmptyCompletion,
    #[error("completion is not a playlist object: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<ureq::Error> for GeneratorError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => GeneratorError::Timeout,
            ureq::Error::StatusCode(code) => GeneratorError::Status(code),
            other => GeneratorError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Text-in, text-out completion service.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client sending one user message.
pub struct ChatCompletionClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionClient {
    /// Build from config. The API key must be present in the configured
    /// environment variable.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GeneratorError::MissingApiKey(config.api_key_env.clone()))?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Ok(Self {
            agent,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl CompletionClient for ChatCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        log::debug!("Requesting completion from {} ({})", self.endpoint, self.model);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
        };

        let response: ChatResponse = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)?
            .body_mut()
            .read_json()?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GeneratorError::EmptyCompletion)
    }
}

/// Parse a completion into a playlist object.
///
/// Models often wrap JSON in markdown fences or add a sentence around it, so
/// this parses the outermost `{ ... }` span.
pub fn parse_generated(text: &str) -> Result<GeneratedPlaylist> {
    let body = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };
    Ok(serde_json::from_str(body)?)
}

/// Send `prompt` and parse the reply as a playlist.
pub fn request_playlist(client: &dyn CompletionClient, prompt: &str) -> Result<GeneratedPlaylist> {
    let text = client.complete(prompt)?;
    let playlist = parse_generated(&text)?;
    log::info!("Generator proposed {} tracks", playlist.playlist.len());
    Ok(playlist)
}
