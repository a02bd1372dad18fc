use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub telegram: Option<TelegramConfig>,
    pub agent: AgentConfig,
    pub bot: BotConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig> {
        self.database
            .as_ref()
            .context("database config is required (set APP_DATABASE__URL)")
    }

    pub fn require_telegram(&self) -> Result<&TelegramConfig> {
        self.telegram
            .as_ref()
            .context("telegram config is required (set APP_TELEGRAM__BOT_TOKEN)")
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT as u16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    pub bot_token: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: defaults::DEFAULT_AGENT_URL.to_string(),
            timeout_secs: defaults::DEFAULT_AGENT_TIMEOUT_SECS as u64,
        }
    }
}

/// Behaviour of the chat front-end.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Action a sender must hold before free text is forwarded to the agent.
    /// When unset, any registered user may talk to the agent.
    pub required_action: Option<String>,
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS as u32
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE as u32
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let cfg = AppConfig::from_vars(HashMap::new()).expect("empty env should load");

        assert_eq!(cfg.general.host, defaults::DEFAULT_HOST);
        assert_eq!(cfg.general.port, 8090);
        assert!(cfg.database.is_none());
        assert!(cfg.telegram.is_none());
        assert_eq!(cfg.agent.url, defaults::DEFAULT_AGENT_URL);
        assert!(cfg.bot.required_action.is_none());
    }

    #[test]
    fn nested_sections_are_read_from_prefixed_variables() {
        let cfg = AppConfig::from_vars(vars(&[
            ("APP_DATABASE__URL", "sqlite::memory:"),
            ("APP_DATABASE__MAX_CONNECTIONS", "4"),
            ("APP_TELEGRAM__BOT_TOKEN", "123:abc"),
            ("APP_AGENT__TIMEOUT_SECS", "5"),
            ("APP_BOT__REQUIRED_ACTION", "agent:chat"),
        ]))
        .expect("config should load");

        let database = cfg.require_database().expect("database should be set");
        assert_eq!(database.url, "sqlite::memory:");
        assert_eq!(database.max_connections, 4);
        assert_eq!(database.min_idle, 2);
        assert_eq!(
            cfg.require_telegram().expect("telegram should be set").bot_token,
            "123:abc"
        );
        assert_eq!(cfg.agent.timeout_secs, 5);
        assert_eq!(cfg.bot.required_action.as_deref(), Some("agent:chat"));
    }

    #[test]
    fn telegram_token_is_redacted_in_debug_output() {
        let cfg = TelegramConfig {
            bot_token: "secret-token".to_string(),
        };
        assert!(!format!("{cfg:?}").contains("secret-token"));
    }
}
