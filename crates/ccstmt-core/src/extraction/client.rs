//! Completion endpoint client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StatementError, UpstreamError};
use crate::models::config::LlmConfig;

/// Sends a prompt to a text-completion service and returns its raw answer.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatContent>,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        Self::with_timeout(api_key, config, Duration::from_secs(config.timeout_secs))
    }

    fn with_timeout(api_key: impl Into<String>, config: &LlmConfig, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StatementError::Config("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("POST {} ({} prompt chars)", self.endpoint, prompt.chars().count());
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        info!(
            "Completion endpoint answered {} in {}ms",
            status,
            start.elapsed().as_millis()
        );

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(UpstreamError::Unauthorized(status.as_u16()).into());
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(UpstreamError::RateLimited.into()),
            s if !s.is_success() => {
                let body = response.text().unwrap_or_default();
                return Err(UpstreamError::Status {
                    status: s.as_u16(),
                    body: body.chars().take(500).collect(),
                }
                .into());
            }
            _ => {}
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|e| self.body_error(e))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| UpstreamError::InvalidResponse("no completion in response".to_string()).into())
    }
}

impl OpenAiClient {
    fn transport_error(&self, e: reqwest::Error) -> StatementError {
        if e.is_timeout() {
            StatementError::Timeout { waited: self.timeout }
        } else {
            UpstreamError::Transport(e.to_string()).into()
        }
    }

    fn body_error(&self, e: reqwest::Error) -> StatementError {
        if e.is_timeout() {
            StatementError::Timeout { waited: self.timeout }
        } else {
            UpstreamError::InvalidResponse(e.to_string()).into()
        }
    }
}
