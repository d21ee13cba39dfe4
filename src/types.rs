use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn as it travels over the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: None,
        }
    }

    /// Attaches base64 images; an empty list leaves the field absent.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = if images.is_empty() { None } else { Some(images) };
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            messages,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

impl ChatResponse {
    pub fn completed(message: ChatMessage) -> Self {
        Self {
            message,
            done: true,
            total_duration: None,
            load_duration: None,
            prompt_eval_count: None,
            prompt_eval_duration: None,
            eval_count: None,
            eval_duration: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ModelsResponse {
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}

/// Model entry as shown in the model picker.
#[derive(Clone, Debug, PartialEq)]
pub struct AIModel {
    pub name: String,
    pub display_name: String,
    pub size: String,
    pub is_downloaded: bool,
}

impl AIModel {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.replace(':', " - "),
            name,
            size: size.into(),
            is_downloaded: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentType {
    Image,
    Document,
    Unknown,
}

impl AttachmentType {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("text/")
            || mime_type.starts_with("application/pdf")
            || mime_type.starts_with("application/msword")
            || mime_type.starts_with("application/vnd.openxmlformats")
        {
            Self::Document
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Image => "IMAGE",
            Self::Document => "DOCUMENT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub locator: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub kind: AttachmentType,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentType::Image
    }

    pub fn is_document(&self) -> bool {
        self.kind == AttachmentType::Document
    }
}

/// A transcript entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: OffsetDateTime,
    pub model_name: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn from_user(
        content: impl Into<String>,
        model_name: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            content: content.into(),
            is_from_user: true,
            timestamp: OffsetDateTime::now_utc(),
            model_name: model_name.into(),
            attachments,
        }
    }

    pub fn from_assistant(content: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_from_user: false,
            timestamp: OffsetDateTime::now_utc(),
            model_name: model_name.into(),
            attachments: Vec::new(),
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        if self.is_from_user {
            ChatMessage::user(self.content.clone())
        } else {
            ChatMessage::assistant(self.content.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mime_types() {
        assert_eq!(AttachmentType::from_mime_type("image/png"), AttachmentType::Image);
        assert_eq!(AttachmentType::from_mime_type("text/plain"), AttachmentType::Document);
        assert_eq!(
            AttachmentType::from_mime_type("application/pdf"),
            AttachmentType::Document
        );
        assert_eq!(
            AttachmentType::from_mime_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            AttachmentType::Document
        );
        assert_eq!(
            AttachmentType::from_mime_type("application/zip"),
            AttachmentType::Unknown
        );
    }

    #[test]
    fn images_field_is_omitted_when_absent() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);

        let json = serde_json::to_string(&ChatMessage::user("hi").with_images(vec![])).unwrap();
        assert!(!json.contains("images"));

        let json =
            serde_json::to_string(&ChatMessage::user("hi").with_images(vec!["abc".into()]))
                .unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi","images":["abc"]}"#);
    }

    #[test]
    fn display_name_replaces_colon() {
        let model = AIModel::new("llama3.2:latest", "2.0 GB");
        assert_eq!(model.display_name, "llama3.2 - latest");
    }

    #[test]
    fn transcript_maps_to_roles() {
        let user = Message::from_user("q", "m", vec![]);
        let reply = Message::from_assistant("a", "m");
        assert_eq!(user.to_chat_message().role, Role::User);
        assert_eq!(reply.to_chat_message().role, Role::Assistant);
    }
}
