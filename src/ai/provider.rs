use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend the user wants to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    #[default]
    Auto,
    GroqOnline,
    OllamaLocal,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Auto, Provider::GroqOnline, Provider::OllamaLocal];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::GroqOnline => "Online (Groq)",
            Self::OllamaLocal => "Offline (Ollama)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Auto => "Smart switching: Online when available, offline as fallback",
            Self::GroqOnline => "Fast online AI with current knowledge",
            Self::OllamaLocal => "Local AI for privacy and offline use",
        }
    }

    pub fn requires_api_key(self) -> bool {
        matches!(self, Self::GroqOnline)
    }

    pub fn requires_internet(self) -> bool {
        matches!(self, Self::GroqOnline)
    }

    /// Stored name, e.g. `GROQ_ONLINE`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::GroqOnline => "GROQ_ONLINE",
            Self::OllamaLocal => "OLLAMA_LOCAL",
        }
    }

    /// Unknown names fall back to the default rather than failing.
    pub fn from_name(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(value.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn has_credential(credential: Option<&str>) -> bool {
    credential.is_some_and(|key| !key.trim().is_empty())
}

/// Maps a preference onto the backend to call. Never returns `Auto`.
pub fn select_provider(
    preference: Provider,
    credential: Option<&str>,
    network_available: bool,
) -> Provider {
    match preference {
        Provider::OllamaLocal => Provider::OllamaLocal,
        Provider::GroqOnline | Provider::Auto => {
            if has_credential(credential) && network_available {
                Provider::GroqOnline
            } else {
                Provider::OllamaLocal
            }
        }
    }
}
