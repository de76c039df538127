//! Application Configuration Module
//!
//! Loads the trainer's settings from the environment (and a `.env` file when
//! present) into a single struct handed to the rest of the binary.

use std::env;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// The agent that plays the caller.
pub const DEFAULT_AGENT_ID: &str = "4uGkYmuvpH9WZlDK3yYN";
/// Where the analysis service publishes training frameworks.
pub const DEFAULT_FLOWS_BASE_URL: &str = callflow_core::retriever::DEFAULT_FLOWS_BASE_URL;
pub const DEFAULT_START_TIMEOUT_SECS: u64 = 15;
/// Microphone chunks buffered between the capture thread and the socket.
pub const MICROPHONE_CHANNEL_CAPACITY: usize = 64;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_id: String,
    pub api_key: Option<String>,
    pub convai_base_url: Option<String>,
    pub flows_base_url: String,
    pub start_timeout: Duration,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid SESSION_START_TIMEOUT_SECS, expected a positive number of seconds: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `CONVAI_AGENT_ID`: (Optional) The voice agent playing the caller. Defaults to the office's trainer agent.
    // *   `ELEVENLABS_API_KEY`: (Optional) Only needed for private agents.
    // *   `CONVAI_BASE_URL`: (Optional) Overrides the conversation socket base URL.
    // *   `FLOWS_BASE_URL`: (Optional) The analysis service. Defaults to "http://127.0.0.1:6970".
    // *   `SESSION_START_TIMEOUT_SECS`: (Optional) How long to wait for the agent to accept a call. Defaults to 15.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let agent_id = match lookup("CONVAI_AGENT_ID") {
            None => DEFAULT_AGENT_ID.to_string(),
            Some(id) if id.trim().is_empty() => {
                return Err(ConfigError::MissingVar(
                    "CONVAI_AGENT_ID is set but empty".to_string(),
                ))
            }
            Some(id) => id.trim().to_string(),
        };

        let api_key = non_empty("ELEVENLABS_API_KEY");
        let convai_base_url = non_empty("CONVAI_BASE_URL");
        let flows_base_url =
            non_empty("FLOWS_BASE_URL").unwrap_or_else(|| DEFAULT_FLOWS_BASE_URL.to_string());

        let start_timeout = match non_empty("SESSION_START_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_START_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        let log_level_str = non_empty("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            agent_id,
            api_key,
            convai_base_url,
            flows_base_url,
            start_timeout,
            log_level,
        })
    }
}
