use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-attempt network deadline. A timed-out attempt is just a failure
/// that triggers retry/rotation.
const ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// One chat-style call. The same request shape is rendered into whatever
/// wire format the vendor expects.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to enforce a JSON object response where supported.
    pub json_response: bool,
}

#[derive(Debug, Clone)]
pub struct ProviderUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    /// Exact usage as reported by the provider, when it reports any.
    pub usage: Option<ProviderUsage>,
}

/// One LLM vendor+model endpoint. Adapters implement only request shaping
/// and response extraction; prompt construction, JSON recovery and
/// retry/rotation live above this trait.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model(&self) -> &str;
    fn endpoint(&self) -> &str;
    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome>;
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(ATTEMPT_TIMEOUT_SECS))
        .build()?)
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions (covers OpenAI, OpenRouter, local
// gateways speaking the same protocol)
// ---------------------------------------------------------------------------

pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            response_format: request
                .json_response
                .then(|| serde_json::json!({ "type": "json_object" })),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat completions request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let parsed: OpenAiResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("empty response from {}", self.model))?;

        Ok(ChatOutcome {
            text,
            usage: parsed.usage.map(|u| ProviderUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Anthropic messages API
// ---------------------------------------------------------------------------

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: i64,
    output_tokens: i64,
}

impl AnthropicBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        ANTHROPIC_ENDPOINT
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "messages request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let parsed: AnthropicResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| anyhow!("empty response from {}", self.model))?;

        Ok(ChatOutcome {
            text,
            usage: parsed.usage.map(|u| ProviderUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }
}
