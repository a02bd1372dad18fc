pub mod configs;
pub mod defaults;
pub mod envconfig;
pub mod validate;

pub use configs::{
    AgentConfig, AppConfig, BotConfig, DatabaseConfig, GeneralConfig, LoggingConfig,
    TelegramConfig,
};
pub use envconfig::EnvConfig;
