use anyhow::{Result, bail};

use super::AppConfig;

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.max_connections == 0 {
            errors.push("database.max_connections must be > 0".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    if let Some(telegram) = cfg.telegram.as_ref() {
        if telegram.bot_token.trim().is_empty() {
            errors.push("telegram.bot_token must not be empty".to_string());
        }
    }

    let agent_url = cfg.agent.url.trim();
    if !(agent_url.starts_with("http://") || agent_url.starts_with("https://")) {
        errors.push(format!(
            "agent.url must be an http(s) url, got '{}'",
            cfg.agent.url
        ));
    }

    if cfg.agent.timeout_secs == 0 {
        errors.push("agent.timeout_secs must be > 0".to_string());
    }

    if let Some(action) = cfg.bot.required_action.as_deref() {
        if action.trim().is_empty() {
            errors.push("bot.required_action must not be blank when set".to_string());
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::config::{AppConfig, DatabaseConfig};

    #[test]
    fn default_config_is_valid() {
        validate(&AppConfig::default()).expect("defaults should validate");
    }

    #[test]
    fn collects_every_problem_into_one_error() {
        let mut cfg = AppConfig::default();
        cfg.general.host = " ".to_string();
        cfg.database = Some(DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_idle: 3,
        });
        cfg.agent.url = "ftp://agent".to_string();
        cfg.agent.timeout_secs = 0;

        let message = validate(&cfg).expect_err("config should be rejected").to_string();

        assert!(message.contains("general.host"));
        assert!(message.contains("database.url"));
        assert!(message.contains("database.min_idle (3)"));
        assert!(message.contains("agent.url"));
        assert!(message.contains("agent.timeout_secs"));
    }
}
