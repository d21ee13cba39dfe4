//! Exodus: chat with a local Ollama server or the Groq cloud API, with
//! attachments, vision-model rerouting and automatic provider fallback.

pub mod ai;
pub mod attachments;
pub mod config;
pub mod guidance;
pub mod logging;
pub mod network;
pub mod prefs;
pub mod repository;
pub mod session;
pub mod types;
