//! The chat orchestrator.
//!
//! `ChatRepository` resolves a provider, builds the outgoing message, talks to
//! the chosen backend and turns every outcome into displayable text. Nothing
//! it returns is an error: failures become guidance messages.

use crate::ai::{
    ApiError, ApiResult, CloudBackend, LocalBackend, Provider, select_provider, vision,
};
use crate::attachments::{AttachmentSource, format_bytes};
use crate::guidance;
use crate::network::NetworkMonitor;
use crate::types::{AIModel, Attachment, ChatMessage, ChatRequest, Message};
use anyhow::Context;
use std::sync::Arc;

const FALLBACK_MODEL: &str = "llama3.2:latest";

/// The model a local request goes to, plus the banner announcing a switch.
struct LocalModel {
    name: String,
    banner: String,
}

#[derive(Clone)]
pub struct ChatRepository {
    local: Arc<dyn LocalBackend>,
    cloud: Arc<dyn CloudBackend>,
    attachments: Arc<dyn AttachmentSource>,
    network: Arc<dyn NetworkMonitor>,
}

impl ChatRepository {
    pub fn new(
        local: Arc<dyn LocalBackend>,
        cloud: Arc<dyn CloudBackend>,
        attachments: Arc<dyn AttachmentSource>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            local,
            cloud,
            attachments,
            network,
        }
    }

    /// Sends `text` (plus attachments) after `history` and returns the reply
    /// or a guidance message. Never fails.
    pub async fn send_message(
        &self,
        text: &str,
        model: &str,
        history: &[Message],
        attachments: &[Attachment],
        preference: Provider,
        credential: Option<&str>,
    ) -> String {
        tracing::info!(
            %model,
            %preference,
            history = history.len(),
            attachments = attachments.len(),
            "sending message"
        );

        let task = {
            let this = self.clone();
            let text = text.to_string();
            let model = model.to_string();
            let history = history.to_vec();
            let attached = attachments.to_vec();
            let credential = credential.map(str::to_string);
            tokio::spawn(async move {
                this.dispatch(
                    &text,
                    &model,
                    &history,
                    &attached,
                    preference,
                    credential.as_deref(),
                )
                .await
            })
        };

        match task.await.context("chat dispatch aborted") {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!("unexpected failure while sending: {err:#}");
                guidance::demo_mode_exception(text, attachments, &err)
            }
        }
    }

    async fn dispatch(
        &self,
        text: &str,
        model: &str,
        history: &[Message],
        attachments: &[Attachment],
        preference: Provider,
        credential: Option<&str>,
    ) -> String {
        let online = self.network.is_network_available().await;
        let provider = select_provider(preference, credential, online);
        tracing::debug!(%provider, online, "provider resolved");

        let has_images = attachments.iter().any(Attachment::is_image);

        if provider == Provider::OllamaLocal {
            let banner = match preference {
                Provider::GroqOnline => {
                    let reason = if online {
                        "no API key configured"
                    } else {
                        "no network connection"
                    };
                    tracing::warn!("Groq unavailable ({reason}), using Ollama");
                    guidance::ollama_downgrade_banner(reason)
                }
                Provider::Auto => {
                    tracing::info!(
                        has_key = credential.is_some_and(|k| !k.trim().is_empty()),
                        online,
                        "skipping Groq in auto mode"
                    );
                    String::new()
                }
                Provider::OllamaLocal => String::new(),
            };
            // Resolve before touching attachment files; no vision model means no request.
            let Some(local) = self.resolve_local_model(model, has_images).await else {
                return guidance::vision_required(model, text);
            };
            let messages = self.build_messages(text, history, attachments).await;
            return match self.run_ollama(&local, messages).await {
                Ok(reply) => format!("{banner}{reply}"),
                Err(err) => {
                    tracing::error!("Ollama request failed: {err}");
                    guidance::ollama_failure(&err, model, text, attachments)
                }
            };
        }

        // Groq was selected, so a credential is present.
        let api_key = credential.unwrap_or_default();
        let messages = self.build_messages(text, history, attachments).await;
        match self.run_groq(model, &messages, api_key).await {
            Ok(reply) => reply,
            Err(groq_err) if preference == Provider::Auto => {
                tracing::warn!("Groq failed in auto mode, falling back to Ollama: {groq_err}");
                let Some(local) = self.resolve_local_model(model, has_images).await else {
                    return guidance::vision_required(model, text);
                };
                match self.run_ollama(&local, messages).await {
                    Ok(reply) => format!("{}{reply}", guidance::AUTO_FALLBACK_BANNER),
                    Err(ollama_err) => {
                        tracing::error!("Ollama fallback failed: {ollama_err}");
                        guidance::both_providers_failed(text, &groq_err, &ollama_err)
                    }
                }
            }
            Err(err) => {
                tracing::error!("Groq request failed: {err}");
                guidance::groq_failure(&err, text)
            }
        }
    }

    /// History in order, then the outgoing user turn.
    async fn build_messages(
        &self,
        text: &str,
        history: &[Message],
        attachments: &[Attachment],
    ) -> Vec<ChatMessage> {
        let documents = self.attachments.extract_documents(attachments).await;
        let images = self.attachments.encode_images(attachments).await;

        let content = format!("{text}{}", guidance::document_blocks(&documents));
        let mut messages: Vec<ChatMessage> = history.iter().map(Message::to_chat_message).collect();
        messages.push(ChatMessage::user(content).with_images(images));
        messages
    }

    /// `None` when images need a vision model and none is installed.
    async fn resolve_local_model(&self, model: &str, has_images: bool) -> Option<LocalModel> {
        if !vision::needs_vision_reroute(model, has_images, true) {
            return Some(LocalModel {
                name: model.to_string(),
                banner: String::new(),
            });
        }
        tracing::warn!("image attachments sent to non-vision model: {model}");
        let found = self.find_vision_model().await?;
        tracing::info!("auto-switched to vision model: {found}");
        Some(LocalModel {
            banner: guidance::vision_switch_banner(&found),
            name: found,
        })
    }

    async fn run_ollama(&self, local: &LocalModel, messages: Vec<ChatMessage>) -> ApiResult<String> {
        let request = ChatRequest::new(local.name.clone(), messages);
        let response = self.local.send_chat(&request).await?;
        Ok(format!("{}{}", local.banner, response.message.content))
    }

    async fn find_vision_model(&self) -> Option<String> {
        match self.local.list_models().await {
            Ok(models) => {
                let names = models.names();
                tracing::debug!("searching for vision models in: {}", names.join(", "));
                vision::find_best_vision_model(&names)
            }
            Err(err) => {
                tracing::error!("failed to fetch models for vision detection: {err}");
                None
            }
        }
    }

    /// Models outside Groq's catalog are replaced by the configured default,
    /// and the reply says so.
    async fn run_groq(
        &self,
        model: &str,
        messages: &[ChatMessage],
        api_key: &str,
    ) -> ApiResult<String> {
        let groq_model = if self.cloud.supports_model(model) {
            model
        } else {
            self.cloud.default_model()
        };
        let request = ChatRequest::new(groq_model, messages.to_vec());
        tracing::debug!(model = %groq_model, "dispatching to Groq");
        let response = self.cloud.send_chat(&request, api_key).await?;
        if groq_model == model {
            Ok(response.message.content)
        } else {
            Ok(format!(
                "{}{}",
                guidance::groq_model_banner(groq_model),
                response.message.content
            ))
        }
    }

    // ============================================
    // Model Management
    // ============================================

    /// Installed models, or a single fallback entry when the server can't be asked.
    pub async fn get_available_models(&self) -> Vec<AIModel> {
        match self.local.list_models().await {
            Ok(response) => response
                .models
                .iter()
                .map(|m| AIModel::new(m.name.clone(), format_bytes(m.size)))
                .collect(),
            Err(err) => {
                tracing::warn!("failed to fetch models, using fallback list: {err}");
                vec![fallback_model()]
            }
        }
    }

    pub async fn download_model(&self, name: &str) -> String {
        match self.local.pull_model(name).await {
            Ok(()) => {
                tracing::info!("model download started: {name}");
                "Model download started".to_string()
            }
            Err(err) => format!("Failed to download model: {}", describe(&err)),
        }
    }

    pub async fn test_groq_key(&self, api_key: &str) -> bool {
        self.cloud.test_api_key(api_key).await
    }
}

fn fallback_model() -> AIModel {
    AIModel {
        name: FALLBACK_MODEL.to_string(),
        display_name: "Llama 3.2 Latest".to_string(),
        size: "2.0 GB".to_string(),
        is_downloaded: true,
    }
}

fn describe(err: &ApiError) -> String {
    match err {
        ApiError::Http { status, body } if body.trim().is_empty() => format!("HTTP {status}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::DocumentContent;
    use crate::network::StaticNetwork;
    use crate::types::{AttachmentType, ChatResponse, ModelInfo, ModelsResponse};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeOllama {
        reply: Option<String>,
        models: Vec<&'static str>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl LocalBackend for FakeOllama {
        async fn send_chat(&self, request: &ChatRequest) -> ApiResult<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Some(text) => Ok(ChatResponse::completed(ChatMessage::assistant(text.clone()))),
                None => Err(ApiError::Connection {
                    backend: "Ollama",
                    detail: "Connection refused".into(),
                }),
            }
        }

        async fn list_models(&self) -> ApiResult<ModelsResponse> {
            Ok(ModelsResponse {
                models: self
                    .models
                    .iter()
                    .map(|name| ModelInfo {
                        name: name.to_string(),
                        size: 2_147_483_648,
                        digest: String::new(),
                        modified_at: String::new(),
                    })
                    .collect(),
            })
        }

        async fn pull_model(&self, _name: &str) -> ApiResult<()> {
            Err(ApiError::Http {
                status: 500,
                body: String::new(),
            })
        }
    }

    struct FakeGroq {
        result: Result<String, ApiError>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeGroq {
        fn replying(text: &str) -> Self {
            Self {
                result: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: ApiError) -> Self {
            Self {
                result: Err(err),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CloudBackend for FakeGroq {
        async fn send_chat(&self, request: &ChatRequest, _api_key: &str) -> ApiResult<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.result
                .clone()
                .map(|text| ChatResponse::completed(ChatMessage::assistant(text)))
        }

        fn default_model(&self) -> &str {
            "llama-3.1-70b-versatile"
        }

        fn supports_model(&self, name: &str) -> bool {
            name == "llama-3.1-8b-instant"
        }
    }

    #[derive(Default)]
    struct FakeAttachments {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl AttachmentSource for FakeAttachments {
        async fn encode_images(&self, attachments: &[Attachment]) -> Vec<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            attachments
                .iter()
                .filter(|a| a.is_image())
                .map(|_| "aGVsbG8=".to_string())
                .collect()
        }

        async fn extract_documents(&self, attachments: &[Attachment]) -> Vec<DocumentContent> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            attachments
                .iter()
                .filter(|a| a.is_document())
                .map(|a| DocumentContent {
                    file_name: a.file_name.clone(),
                    mime_type: a.mime_type.clone(),
                    text_content: "doc text".into(),
                })
                .collect()
        }
    }

    fn repository(
        ollama: Arc<FakeOllama>,
        groq: Arc<FakeGroq>,
        online: bool,
    ) -> ChatRepository {
        ChatRepository::new(
            ollama,
            groq,
            Arc::new(FakeAttachments::default()),
            Arc::new(StaticNetwork(online)),
        )
    }

    fn image() -> Attachment {
        Attachment {
            id: "img".into(),
            locator: PathBuf::from("cat.png"),
            file_name: "cat.png".into(),
            mime_type: "image/png".into(),
            size: 5,
            kind: AttachmentType::Image,
        }
    }

    #[tokio::test]
    async fn plain_ollama_reply_has_no_banner() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("Hello!".into()),
            ..Default::default()
        });
        let repo = repository(ollama.clone(), Arc::new(FakeGroq::replying("unused")), true);

        let reply = repo
            .send_message("Hi", "llama3.2:latest", &[], &[], Provider::OllamaLocal, None)
            .await;

        assert_eq!(reply, "Hello!");
        let requests = ollama.requests.lock().unwrap();
        assert_eq!(requests[0].model, "llama3.2:latest");
        assert_eq!(requests[0].messages, vec![ChatMessage::user("Hi")]);
    }

    #[tokio::test]
    async fn auto_falls_back_to_ollama_once() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("Hi".into()),
            ..Default::default()
        });
        let groq = Arc::new(FakeGroq::failing(ApiError::Connection {
            backend: "Groq",
            detail: "connection reset".into(),
        }));
        let repo = repository(ollama.clone(), groq.clone(), true);

        let reply = repo
            .send_message("Hello", "llama3.2:latest", &[], &[], Provider::Auto, Some("gsk_test"))
            .await;

        assert_eq!(reply, "🔄 **Auto Fallback**: Groq failed, switched to Ollama\n\nHi");
        assert_eq!(groq.requests.lock().unwrap().len(), 1);
        assert_eq!(ollama.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auto_reports_when_both_fail() {
        let ollama = Arc::new(FakeOllama::default());
        let groq = Arc::new(FakeGroq::failing(ApiError::Http {
            status: 503,
            body: "overloaded".into(),
        }));
        let repo = repository(ollama, groq, true);

        let reply = repo
            .send_message("Hello", "llama3.2:latest", &[], &[], Provider::Auto, Some("gsk_test"))
            .await;

        assert!(reply.starts_with("❌ **Both Providers Failed**"));
        assert!(reply.contains("HTTP 503: overloaded"));
        assert!(reply.contains("Connection refused"));
    }

    #[tokio::test]
    async fn auto_without_key_skips_groq_silently() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("local".into()),
            ..Default::default()
        });
        let groq = Arc::new(FakeGroq::replying("cloud"));
        let repo = repository(ollama, groq.clone(), true);

        let reply = repo
            .send_message("Hello", "llama3.2:latest", &[], &[], Provider::Auto, None)
            .await;

        assert_eq!(reply, "local");
        assert!(groq.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn groq_online_downgrade_is_announced() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("local".into()),
            ..Default::default()
        });
        let repo = repository(ollama, Arc::new(FakeGroq::replying("cloud")), false);

        let reply = repo
            .send_message("Hello", "llama3.2:latest", &[], &[], Provider::GroqOnline, Some("gsk"))
            .await;

        assert_eq!(
            reply,
            "📴 **Using Ollama**: Groq unavailable (no network connection)\n\nlocal"
        );
    }

    #[tokio::test]
    async fn groq_online_failure_does_not_fall_back() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("local".into()),
            ..Default::default()
        });
        let groq = Arc::new(FakeGroq::failing(ApiError::Http {
            status: 429,
            body: String::new(),
        }));
        let repo = repository(ollama.clone(), groq, true);

        let reply = repo
            .send_message("Hello", "m", &[], &[], Provider::GroqOnline, Some("gsk"))
            .await;

        assert!(reply.contains("rate limiting"));
        assert!(ollama.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn groq_uses_catalog_model_or_default() {
        let groq = Arc::new(FakeGroq::replying("ok"));
        let repo = repository(Arc::new(FakeOllama::default()), groq.clone(), true);

        repo.send_message("a", "llama-3.1-8b-instant", &[], &[], Provider::GroqOnline, Some("k"))
            .await;
        repo.send_message("b", "llama3.2:latest", &[], &[], Provider::GroqOnline, Some("k"))
            .await;

        let requests = groq.requests.lock().unwrap();
        assert_eq!(requests[0].model, "llama-3.1-8b-instant");
        assert_eq!(requests[1].model, "llama-3.1-70b-versatile");
    }

    #[tokio::test]
    async fn groq_model_substitution_is_announced() {
        let groq = Arc::new(FakeGroq::replying("ok"));
        let repo = repository(Arc::new(FakeOllama::default()), groq, true);

        let kept = repo
            .send_message("a", "llama-3.1-8b-instant", &[], &[], Provider::GroqOnline, Some("k"))
            .await;
        assert_eq!(kept, "ok");

        let swapped = repo
            .send_message("b", "llama3.2:latest", &[], &[], Provider::GroqOnline, Some("k"))
            .await;
        assert_eq!(
            swapped,
            "☁️ **Using Groq model: llama-3.1-70b-versatile**\n\nok"
        );

        let auto = repo
            .send_message("c", "llama3.2:latest", &[], &[], Provider::Auto, Some("k"))
            .await;
        assert_eq!(auto, "☁️ **Using Groq model: llama-3.1-70b-versatile**\n\nok");
    }

    #[tokio::test]
    async fn image_without_vision_model_returns_guidance() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("should not be sent".into()),
            models: vec!["llama3.2:latest", "mistral:7b"],
            ..Default::default()
        });
        let files = Arc::new(FakeAttachments::default());
        let repo = ChatRepository::new(
            ollama.clone(),
            Arc::new(FakeGroq::replying("x")),
            files.clone(),
            Arc::new(StaticNetwork(true)),
        );

        let reply = repo
            .send_message(
                "What is this?",
                "llama3.2:latest",
                &[],
                &[image()],
                Provider::OllamaLocal,
                None,
            )
            .await;

        assert_eq!(reply, guidance::vision_required("llama3.2:latest", "What is this?"));
        assert!(ollama.requests.lock().unwrap().is_empty());
        assert_eq!(files.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_reroutes_to_vision_model() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("A cat.".into()),
            models: vec!["llama3.2:latest", "moondream:latest", "llava-phi3:latest"],
            ..Default::default()
        });
        let repo = repository(ollama.clone(), Arc::new(FakeGroq::replying("x")), true);

        let reply = repo
            .send_message(
                "What is this?",
                "llama3.2:latest",
                &[],
                &[image()],
                Provider::OllamaLocal,
                None,
            )
            .await;

        assert_eq!(
            reply,
            "🔄 **Auto-switched to vision model: llava-phi3:latest**\n\nA cat."
        );
        let requests = ollama.requests.lock().unwrap();
        assert_eq!(requests[0].model, "llava-phi3:latest");
        assert_eq!(
            requests[0].messages[0].images,
            Some(vec!["aGVsbG8=".to_string()])
        );
    }

    #[tokio::test]
    async fn history_precedes_outgoing_turn_with_documents() {
        let ollama = Arc::new(FakeOllama {
            reply: Some("ok".into()),
            ..Default::default()
        });
        let repo = repository(ollama.clone(), Arc::new(FakeGroq::replying("x")), true);
        let history = vec![
            Message::from_user("first", "llama3.2:latest", Vec::new()),
            Message::from_assistant("reply", "llama3.2:latest"),
        ];
        let doc = Attachment {
            id: "doc".into(),
            locator: PathBuf::from("notes.txt"),
            file_name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            size: 8,
            kind: AttachmentType::Document,
        };

        repo.send_message("second", "llama3.2:latest", &history, &[doc], Provider::OllamaLocal, None)
            .await;

        let requests = ollama.requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::user("first"));
        assert_eq!(messages[1], ChatMessage::assistant("reply"));
        assert!(messages[2].content.starts_with("second\n\n📄 **Attached Documents:**"));
        assert!(messages[2].content.contains("doc text"));
        assert_eq!(messages[2].images, None);
    }

    #[tokio::test]
    async fn model_listing_and_downloads() {
        let ollama = Arc::new(FakeOllama {
            models: vec!["llama3.2:latest"],
            ..Default::default()
        });
        let repo = repository(ollama, Arc::new(FakeGroq::replying("x")), true);

        let models = repo.get_available_models().await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].display_name, "llama3.2 - latest");
        assert_eq!(models[0].size, "2.0 GB");

        assert_eq!(
            repo.download_model("llava").await,
            "Failed to download model: HTTP 500"
        );
        assert!(repo.test_groq_key("gsk_valid").await);
    }
}
