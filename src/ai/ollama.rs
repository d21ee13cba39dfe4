use super::{ApiError, ApiResult, LocalBackend};
use crate::types::{ChatRequest, ChatResponse, ModelsResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const BACKEND: &str = "Ollama";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    pub fn with_timeouts(base_url: impl Into<String>, connect: Duration, read: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(read)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

pub fn parse_chat_response(body: &str) -> ApiResult<ChatResponse> {
    if body.trim().is_empty() {
        return Err(ApiError::EmptyResponse(BACKEND));
    }
    serde_json::from_str::<ChatResponse>(body).map_err(|err| ApiError::Parse(err.to_string()))
}

pub fn parse_models_response(body: &str) -> ApiResult<ModelsResponse> {
    if body.trim().is_empty() {
        return Err(ApiError::EmptyResponse(BACKEND));
    }
    serde_json::from_str::<ModelsResponse>(body).map_err(|err| ApiError::Parse(err.to_string()))
}

#[async_trait]
impl LocalBackend for OllamaClient {
    async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatResponse> {
        let url = self.url("/api/chat");
        tracing::debug!(
            %url,
            model = %request.model,
            messages = request.messages.len(),
            "sending Ollama chat request"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;

        if !status.is_success() {
            tracing::error!("Ollama error {status}: {body}");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = parse_chat_response(&body)?;
        tracing::info!(
            chars = parsed.message.content.len(),
            done = parsed.done,
            "Ollama response received"
        );
        Ok(parsed)
    }

    async fn list_models(&self) -> ApiResult<ModelsResponse> {
        let url = self.url("/api/tags");
        tracing::debug!(%url, "fetching available models");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;

        if !status.is_success() {
            tracing::error!("Ollama models error {status}");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let models = parse_models_response(&body)?;
        tracing::info!("found {} available models", models.models.len());
        Ok(models)
    }

    async fn pull_model(&self, name: &str) -> ApiResult<()> {
        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&PullRequest {
                name,
                stream: false,
            })
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(BACKEND, err))?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(model = name, "model pull accepted");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}
