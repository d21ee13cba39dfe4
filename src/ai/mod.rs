/// AI module for Exodus
///
/// Backend clients and the decision logic that sits in front of them.
///
/// # Architecture
///
/// - `ollama` - Local Ollama server client (chat, model listing, pulls)
/// - `groq` - Groq cloud client (OpenAI-compatible chat completions)
/// - `provider` - Provider preference and the selection rules
/// - `vision` - Vision model detection and reroute resolution
///
/// # Usage
///
/// ```rust,no_run
/// use exodus::ai::{LocalBackend, OllamaClient};
/// use exodus::types::{ChatMessage, ChatRequest};
///
/// # async fn example() -> anyhow::Result<()> {
/// let ollama = OllamaClient::new("http://127.0.0.1:11434");
/// let request = ChatRequest::new("llama3.2:latest", vec![ChatMessage::user("Hello!")]);
/// let response = ollama.send_chat(&request).await?;
/// println!("{}", response.message.content);
/// # Ok(())
/// # }
/// ```
pub mod groq;
pub mod ollama;
pub mod provider;
pub mod vision;

use crate::types::{ChatMessage, ChatRequest, ChatResponse, ModelsResponse};
use async_trait::async_trait;

pub use groq::GroqClient;
pub use ollama::OllamaClient;
pub use provider::{Provider, select_provider};

// ============================================
// Error Types
// ============================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("Failed to connect to {backend}: {detail}")]
    Connection {
        backend: &'static str,
        detail: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No API key configured")]
    MissingCredential,

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn from_reqwest(backend: &'static str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Connection {
                backend,
                detail: err.to_string(),
            }
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Ollama answers 404 with `model "x" not found` for missing models.
    pub fn is_model_not_found(&self) -> bool {
        match self {
            Self::Http { status, body } => {
                let body = body.to_ascii_lowercase();
                *status == 404 || (body.contains("model") && body.contains("not found"))
            }
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================
// Backend Seams
// ============================================

/// The on-device / LAN backend.
#[async_trait]
pub trait LocalBackend: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatResponse>;

    async fn list_models(&self) -> ApiResult<ModelsResponse>;

    /// Fire-and-forget pull; success only means the server accepted it.
    async fn pull_model(&self, name: &str) -> ApiResult<()>;
}

/// A hosted backend authenticated per call.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest, api_key: &str) -> ApiResult<ChatResponse>;

    fn default_model(&self) -> &str;

    fn supports_model(&self, name: &str) -> bool;

    /// Sends a minimal request; any successful reply means the key works.
    async fn test_api_key(&self, api_key: &str) -> bool {
        let request = ChatRequest::new(
            self.default_model().to_string(),
            vec![ChatMessage::user("Hello")],
        );
        match self.send_chat(&request, api_key).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("API key test failed: {err}");
                false
            }
        }
    }
}
