//! User-facing text: switch banners, backend failure guidance and the
//! document/attachment summaries appended to messages.
//!
//! Everything here is pure formatting so the repository only has to pick
//! which message applies.

use crate::ai::ApiError;
use crate::attachments::DocumentContent;
use crate::types::Attachment;

// ============================================
// Banners
// ============================================

pub fn vision_switch_banner(model: &str) -> String {
    format!("🔄 **Auto-switched to vision model: {model}**\n\n")
}

pub fn groq_model_banner(model: &str) -> String {
    format!("☁️ **Using Groq model: {model}**\n\n")
}

pub const AUTO_FALLBACK_BANNER: &str = "🔄 **Auto Fallback**: Groq failed, switched to Ollama\n\n";

pub fn ollama_downgrade_banner(reason: &str) -> String {
    format!("📴 **Using Ollama**: Groq unavailable ({reason})\n\n")
}

// ============================================
// Message Payload
// ============================================

/// Document text appended after the user's own text.
pub fn document_blocks(documents: &[DocumentContent]) -> String {
    if documents.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n📄 **Attached Documents:**\n");
    for (index, doc) in documents.iter().enumerate() {
        out.push_str(&format!(
            "\n**{}. {}**\nType: {}\nContent:\n```\n{}\n```\n",
            index + 1,
            doc.file_name,
            doc.mime_type,
            doc.text_content
        ));
    }
    out
}

/// Echo of what was attached, shown in failure diagnostics.
pub fn attachments_received(attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return String::new();
    }
    let items: Vec<String> = attachments
        .iter()
        .map(|a| format!("• {} ({})", a.file_name, a.kind))
        .collect();
    format!(
        "\n\n📎 **Attachments received ({}):**\n{}",
        attachments.len(),
        items.join("\n")
    )
}

// ============================================
// Failure Guidance
// ============================================

pub fn vision_required(model: &str, text: &str) -> String {
    format!(
        "🤖 **Vision Model Required**\n\n\
         You've attached an image, but **{model}** is a text-only model that doesn't support image analysis.\n\n\
         **No vision models found on your server!**\n\n\
         **To analyze images, install a vision model:**\n\
         • `ollama pull llava` - General image analysis (recommended)\n\
         • `ollama pull bakllava` - Llama-based vision model\n\
         • `ollama pull moondream` - Lightweight vision model\n\n\
         **After installing:**\n\
         1. Restart your Ollama server\n\
         2. Resend your image - Exodus will auto-switch to the vision model!\n\n\
         Your text message: \"{text}\""
    )
}

fn looks_like_connection_failure(err: &ApiError) -> bool {
    if err.is_connection() {
        return true;
    }
    let message = err.to_string();
    [
        "Failed to connect",
        "Connection refused",
        "Unable to resolve host",
        "Network connection failed",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

pub fn ollama_failure(err: &ApiError, model: &str, text: &str, attachments: &[Attachment]) -> String {
    let received = attachments_received(attachments);
    if err.is_model_not_found() {
        format!(
            "🤖 **Model Not Found**\n\n\
             The model '{model}' is not available on your Ollama server.\n\n\
             **Available model on your server:**\n\
             • llama3.2:latest (recommended - most recent knowledge)\n\n\
             **To install more models:**\n\
             1. `ollama pull llama3.1` - Install Llama 3.1\n\
             2. `ollama pull codellama` - Install CodeLlama for coding\n\
             3. `ollama list` - See all installed models\n\n\
             Please select Llama 3.2 with /model.{received}"
        )
    } else if looks_like_connection_failure(err) {
        format!(
            "🤖 **Demo Mode Active**\n\n\
             Hi! I received your message: \"{text}\"{received}\n\n\
             I'm currently running in demo mode because Ollama server is not available. \
             To get real AI responses:\n\n\
             1. Install Ollama from https://ollama.ai\n\
             2. Run: `ollama pull llama3.2`\n\
             3. Start server: `ollama serve`\n\n\
             For now, I can only echo your messages in demo mode!"
        )
    } else {
        format!(
            "🤖 **Demo Response**\n\n\
             Your message: \"{text}\"{received}\n\n\
             API Error: {err}\n\n\
             To enable real AI responses, please install Ollama server."
        )
    }
}

pub fn groq_failure(err: &ApiError, text: &str) -> String {
    let detail = if matches!(err, ApiError::MissingCredential) {
        "No Groq API key is configured. Add one with /key <your-key> \
         (get a free key from console.groq.com/keys)."
            .to_string()
    } else if err.is_unauthorized() {
        "Groq rejected the API key (HTTP 401). Check the key with /key and try again.".to_string()
    } else if err.is_rate_limited() {
        "Groq is rate limiting requests (HTTP 429). Wait a moment and resend, \
         or switch to Ollama with /provider ollama."
            .to_string()
    } else if looks_like_connection_failure(err) {
        format!("Could not reach Groq: {err}\n\nCheck your internet connection or switch to Ollama with /provider ollama.")
    } else {
        format!("Groq API Error: {err}")
    };
    format!("☁️ **Groq Request Failed**\n\nYour message: \"{text}\"\n\n{detail}")
}

pub fn both_providers_failed(text: &str, groq_err: &ApiError, ollama_err: &ApiError) -> String {
    format!(
        "❌ **Both Providers Failed**\n\n\
         Your message: \"{text}\"\n\n\
         • Groq: {groq_err}\n\
         • Ollama: {ollama_err}\n\n\
         Check your internet connection and Groq API key, or start a local server with `ollama serve`."
    )
}

pub fn demo_mode_exception(text: &str, attachments: &[Attachment], err: &anyhow::Error) -> String {
    let received = attachments_received(attachments);
    format!(
        "🤖 **Demo Mode - Exception Caught**\n\n\
         Your message: \"{text}\"{received}\n\n\
         This is a test response since the chat request could not complete.\n\n\
         Error details: {err:#}\n\n\
         **To get real AI responses:**\n\
         1. Install Ollama from https://ollama.ai\n\
         2. Run: `ollama pull llama3.2`\n\
         3. Start: `ollama serve`"
    )
}
