//! Language-model invocation over the OpenAI-compatible chat API.
//!
//! OpenAI and Groq both serve `POST {base}/chat/completions`, so one
//! client covers both; only the endpoint, default model and credential
//! variable differ (see [`LlmConfig`]).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::ConfigError;

/// Something that turns a system + user prompt into text.
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct ChatModel {
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
    timeout: Duration,
}

impl ChatModel {
    pub fn new(config: &LlmConfig, api_key: String) -> Self {
        Self {
            model: config.model_name(),
            endpoint: format!("{}/chat/completions", config.endpoint()),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_mode,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl LanguageModel for ChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: Some(system.to_string()),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Some(user.to_string()),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            stream: false,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .with_context(|| format!("chat completion request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("chat completion error {}: {}", status, body);
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .context("invalid chat completion response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .context("chat completion returned no content")?;

        debug!(model = %self.model, chars = content.len(), "model responded");
        Ok(content)
    }
}

/// Build the configured model.
///
/// `Ok(None)` when the provider is `disabled`. A missing credential is a
/// [`ConfigError::MissingCredential`]; the variable is read here, at the
/// point of use, never from the config file.
pub fn create_model(config: &LlmConfig) -> Result<Option<Box<dyn LanguageModel>>, ConfigError> {
    if !config.is_enabled() {
        return Ok(None);
    }
    let var = config.api_key_var();
    let api_key = std::env::var(&var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingCredential {
            provider: config.provider.clone(),
            env_var: var.clone(),
        })?;
    Ok(Some(Box::new(ChatModel::new(config, api_key))))
}
