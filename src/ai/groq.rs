use super::{ApiError, ApiResult, CloudBackend};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";
pub const AVAILABLE_MODELS: &[&str] = &[
    "llama-3.1-70b-versatile",
    "llama-3.1-8b-instant",
    "mixtral-8x7b-32768",
    "gemma-7b-it",
];

const BACKEND: &str = "Groq API";
const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f64 = 0.7;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GroqClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl GroqClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, model, CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        model: impl Into<String>,
        connect: Duration,
        read: Duration,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(read)
            .build()
            .unwrap_or_default();
        let base_url = base_url.into();
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for GroqClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

#[derive(Serialize)]
struct GroqMessage {
    role: Role,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct GroqChatRequest<'a> {
    model: &'a str,
    messages: Vec<GroqMessage>,
    stream: bool,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct GroqResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: Option<GroqResponseMessage>,
}

#[derive(Deserialize)]
struct GroqChatResponse {
    #[serde(default)]
    choices: Vec<GroqChoice>,
}

/// Plain turns keep string content; turns with images become OpenAI content parts.
fn to_groq_messages(messages: &[ChatMessage]) -> Vec<GroqMessage> {
    messages
        .iter()
        .map(|msg| {
            let content = match &msg.images {
                Some(images) if !images.is_empty() => {
                    let mut parts = vec![json!({ "type": "text", "text": msg.content })];
                    parts.extend(images.iter().map(|img| {
                        json!({
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/jpeg;base64,{img}") }
                        })
                    }));
                    serde_json::Value::Array(parts)
                }
                _ => json!(msg.content),
            };
            GroqMessage {
                role: msg.role,
                content,
            }
        })
        .collect()
}

fn build_request_body(request: &ChatRequest) -> serde_json::Value {
    let payload = GroqChatRequest {
        model: &request.model,
        messages: to_groq_messages(&request.messages),
        stream: false,
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    };
    serde_json::to_value(payload).unwrap_or_default()
}

pub fn parse_groq_response(body: &str) -> ApiResult<ChatResponse> {
    if body.trim().is_empty() {
        return Err(ApiError::EmptyResponse(BACKEND));
    }
    let parsed = serde_json::from_str::<GroqChatResponse>(body)
        .map_err(|err| ApiError::Parse(err.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| ApiError::Parse("no content in Groq response".to_string()))?;
    Ok(ChatResponse::completed(ChatMessage::assistant(content)))
}

#[async_trait]
impl CloudBackend for GroqClient {
    async fn send_chat(&self, request: &ChatRequest, api_key: &str) -> ApiResult<ChatResponse> {
        if api_key.trim().is_empty() {
            return Err(ApiError::MissingCredential);
        }
        tracing::info!(model = %request.model, "starting Groq chat");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.trim())
            .json(&build_request_body(request))
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;

        if !status.is_success() {
            tracing::error!("Groq error {status}: {body}");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = parse_groq_response(&body)?;
        tracing::info!("Groq response parsed successfully");
        Ok(parsed)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn supports_model(&self, name: &str) -> bool {
        AVAILABLE_MODELS.contains(&name)
    }
}
