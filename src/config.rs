use crate::ai::{groq, ollama};
use crate::network::DEFAULT_PROBE_ADDR;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Defaults compiled into the binary, used when there is no `.env`.
pub const BUNDLED_DEFAULTS: &str = include_str!("../assets/config.env");

/// Fills the process environment from `.env`, or from [`BUNDLED_DEFAULTS`]
/// when no `.env` can be loaded. Variables that are already set are kept.
pub fn load_environment() -> Result<(), dotenvy::Error> {
    if dotenvy::dotenv().is_ok() {
        return Ok(());
    }
    dotenvy::from_read(BUNDLED_DEFAULTS.as_bytes())
}

/// Runtime settings, read from the process environment.
///
/// The binary populates the environment from `.env` (or the bundled
/// `assets/config.env`) before calling [`AppConfig::from_env`].
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub ollama_connect_timeout: Duration,
    pub ollama_read_timeout: Duration,
    pub groq_base_url: String,
    pub groq_model: String,
    pub groq_connect_timeout: Duration,
    pub groq_read_timeout: Duration,
    pub network_probe_addr: String,
    pub log_filter: String,
    pub preferences_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: ollama::DEFAULT_BASE_URL.to_string(),
            ollama_connect_timeout: Duration::from_secs(10),
            ollama_read_timeout: Duration::from_secs(30),
            groq_base_url: groq::DEFAULT_BASE_URL.to_string(),
            groq_model: groq::DEFAULT_MODEL.to_string(),
            groq_connect_timeout: Duration::from_secs(30),
            groq_read_timeout: Duration::from_secs(60),
            network_probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            log_filter: "info".to_string(),
            preferences_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank or unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            ollama_base_url: text("OLLAMA_BASE_URL", defaults.ollama_base_url),
            ollama_connect_timeout: secs(
                "OLLAMA_CONNECT_TIMEOUT_SECS",
                defaults.ollama_connect_timeout,
            ),
            ollama_read_timeout: secs("OLLAMA_READ_TIMEOUT_SECS", defaults.ollama_read_timeout),
            groq_base_url: text("GROQ_BASE_URL", defaults.groq_base_url),
            groq_model: text("GROQ_MODEL", defaults.groq_model),
            groq_connect_timeout: secs("GROQ_CONNECT_TIMEOUT_SECS", defaults.groq_connect_timeout),
            groq_read_timeout: secs("GROQ_READ_TIMEOUT_SECS", defaults.groq_read_timeout),
            network_probe_addr: text("NETWORK_PROBE_HOST", defaults.network_probe_addr),
            log_filter: text("EXODUS_LOG", defaults.log_filter),
            preferences_path: lookup("EXODUS_PREFS_PATH")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}
