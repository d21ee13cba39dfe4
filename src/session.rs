use crate::ai::Provider;
use crate::prefs::UserPreferences;
use crate::repository::ChatRepository;
use crate::types::{AIModel, Attachment, Message};
use std::sync::Arc;

/// One conversation: transcript, model choice and status flags.
pub struct ChatSession {
    repository: ChatRepository,
    preferences: Arc<UserPreferences>,
    messages: Vec<Message>,
    available_models: Vec<AIModel>,
    selected_model: Option<AIModel>,
    is_loading: bool,
    is_loading_models: bool,
    error_message: Option<String>,
}

impl ChatSession {
    pub fn new(repository: ChatRepository, preferences: Arc<UserPreferences>) -> Self {
        Self {
            repository,
            preferences,
            messages: Vec::new(),
            available_models: Vec::new(),
            selected_model: None,
            is_loading: false,
            is_loading_models: false,
            error_message: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn available_models(&self) -> &[AIModel] {
        &self.available_models
    }

    pub fn selected_model(&self) -> Option<&AIModel> {
        self.selected_model.as_ref()
    }

    pub fn selected_provider(&self) -> Provider {
        self.preferences.selected_provider()
    }

    pub fn has_groq_api_key(&self) -> bool {
        self.preferences.groq_api_key().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_loading_models(&self) -> bool {
        self.is_loading_models
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub async fn load_available_models(&mut self) {
        self.is_loading_models = true;
        let models = self.repository.get_available_models().await;
        if self.selected_model.is_none() {
            self.selected_model = models.first().cloned();
        }
        tracing::info!("{} models available", models.len());
        self.available_models = models;
        self.is_loading_models = false;
    }

    /// Selects by exact name, then by display name; returns the chosen model.
    pub fn select_model(&mut self, name: &str) -> Option<&AIModel> {
        let wanted = name.trim();
        let found = self
            .available_models
            .iter()
            .find(|m| m.name == wanted)
            .or_else(|| {
                self.available_models
                    .iter()
                    .find(|m| m.display_name.eq_ignore_ascii_case(wanted))
            })
            .cloned();
        match found {
            Some(model) => {
                tracing::info!("model selected: {}", model.name);
                self.selected_model = Some(model);
                self.selected_model.as_ref()
            }
            None => {
                self.error_message = Some(format!("Unknown model: {wanted}"));
                None
            }
        }
    }

    /// Sends a message and returns the assistant's reply, or `None` when
    /// there is nothing to send or no model is selected.
    pub async fn send_message(
        &mut self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Option<&Message> {
        let model = self.selected_model.as_ref()?.name.clone();
        if content.trim().is_empty() && attachments.is_empty() {
            return None;
        }

        self.is_loading = true;
        self.error_message = None;

        let preference = self.preferences.selected_provider();
        let credential = self.preferences.groq_api_key();
        let history_len = self.messages.len();
        self.messages
            .push(Message::from_user(content, model.clone(), attachments.clone()));

        let reply = self
            .repository
            .send_message(
                content,
                &model,
                &self.messages[..history_len],
                &attachments,
                preference,
                credential.as_deref(),
            )
            .await;

        self.messages.push(Message::from_assistant(reply, model));
        self.is_loading = false;
        self.messages.last()
    }

    pub async fn download_model(&mut self, name: &str) -> String {
        let status = self.repository.download_model(name).await;
        self.load_available_models().await;
        status
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn select_provider(&mut self, provider: Provider) {
        if let Err(err) = self.preferences.set_selected_provider(provider) {
            tracing::error!("failed to save provider: {err}");
            self.error_message = Some(err.to_string());
        }
    }

    pub fn update_groq_api_key(&mut self, api_key: &str) {
        if let Err(err) = self.preferences.set_groq_api_key(Some(api_key)) {
            tracing::error!("failed to save API key: {err}");
            self.error_message = Some(err.to_string());
        }
    }

    pub async fn test_groq_api_key(&self, api_key: &str) -> bool {
        self.repository.test_groq_key(api_key).await
    }
}
