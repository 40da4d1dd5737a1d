//! Application configuration.
//!
//! Loaded from the environment (and a `.env` file when present) by
//! [`Config::from_env`], or assembled in code through [`ConfigBuilder`].

use std::env;

use tracing::Level;

use crate::consts;
use crate::session::InterruptionPolicy;
use crate::types::audio::Voice;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid interruption policy: {0}")]
    InvalidInterruptionPolicy(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    api_url: String,
    realtime_endpoint: String,
    model: String,
    stun_url: Option<String>,
    voice: Voice,
    user_id: Option<String>,
    interruption: InterruptionPolicy,
    log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: consts::DEFAULT_API_URL.to_string(),
            realtime_endpoint: consts::REALTIME_ENDPOINT.to_string(),
            model: consts::DEFAULT_MODEL.to_string(),
            stun_url: Some(consts::DEFAULT_STUN_URL.to_string()),
            voice: Voice::from(consts::DEFAULT_VOICE),
            user_id: None,
            interruption: InterruptionPolicy::Observe,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    //
    // *   `SULTEN_API_URL`: backend base URL. Defaults to `http://localhost:8080`.
    // *   `REALTIME_ENDPOINT`: SDP signaling endpoint.
    // *   `REALTIME_MODEL`: realtime model passed as the `model` query parameter.
    // *   `STUN_URL`: STUN server for the reflexive candidate. Empty disables it.
    // *   `REALTIME_VOICE`: agent voice. Defaults to "ash".
    // *   `SULTEN_USER_ID`: identity used for recipe lookups.
    // *   `INTERRUPTION_POLICY`: "observe" or "cancel". Defaults to "observe".
    // *   `RUST_LOG`: TRACE, DEBUG, INFO, WARN or ERROR. Defaults to INFO.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stun_url = match lookup("STUN_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url),
            None => defaults.stun_url,
        };

        let interruption = match lookup("INTERRUPTION_POLICY") {
            None => defaults.interruption,
            Some(value) => match value.to_lowercase().as_str() {
                "observe" => InterruptionPolicy::Observe,
                "cancel" => InterruptionPolicy::CancelResponse,
                _ => return Err(ConfigError::InvalidInterruptionPolicy(value)),
            },
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let config = Self {
            api_url: lookup("SULTEN_API_URL").unwrap_or(defaults.api_url),
            realtime_endpoint: lookup("REALTIME_ENDPOINT").unwrap_or(defaults.realtime_endpoint),
            model: lookup("REALTIME_MODEL").unwrap_or(defaults.model),
            stun_url,
            voice: lookup("REALTIME_VOICE").map(|v| Voice::from(v.as_str())).unwrap_or(defaults.voice),
            user_id: lookup("SULTEN_USER_ID").filter(|id| !id.is_empty()),
            interruption,
            log_level,
        };
        tracing::debug!("loaded config: api_url={}, model={}", config.api_url, config.model);
        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn realtime_endpoint(&self) -> &str {
        &self.realtime_endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stun_url(&self) -> Option<&str> {
        self.stun_url.as_deref()
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn interruption(&self) -> InterruptionPolicy {
        self.interruption
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.config.api_url = api_url.to_string();
        self
    }

    pub fn with_realtime_endpoint(mut self, endpoint: &str) -> Self {
        self.config.realtime_endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_stun_url(mut self, stun_url: Option<&str>) -> Self {
        self.config.stun_url = stun_url.map(str::to_string);
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.config.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_interruption(mut self, policy: InterruptionPolicy) -> Self {
        self.config.interruption = policy;
        self
    }

    pub fn with_log_level(mut self, log_level: Level) -> Self {
        self.config.log_level = log_level;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
