use async_trait::async_trait;
use teloxide::{prelude::*, types::ChatId};
use tokio::time::sleep;

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Outbound delivery of plain-text messages to a chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessengerError>;
}

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    const MAX_RETRIES: usize = 1;

    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        if text.trim().is_empty() {
            return Err(MessengerError::Rejected("message text is empty".to_string()));
        }

        let mut attempts = 0;
        loop {
            match self.bot.send_message(ChatId(chat_id), text.to_string()).await {
                Ok(_) => {
                    tracing::debug!(chat_id, "message delivered");
                    return Ok(());
                }
                // Telegram asks flood-limited clients to wait; honour it once.
                Err(teloxide::RequestError::RetryAfter(wait)) if attempts < Self::MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(chat_id, wait_secs = wait.as_secs(), "rate limited by telegram");
                    sleep(wait).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
