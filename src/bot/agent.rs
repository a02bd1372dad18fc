use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("agent responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// One user message for the agent. `thread_id` keys the agent's
/// conversation memory; the bot uses the chat id.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub thread_id: String,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    reply: String,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn ask(&self, request: AgentRequest) -> Result<String, AgentError>;
}

#[derive(Clone)]
pub struct HttpAgentClient {
    http: reqwest::Client,
    url: String,
}

impl HttpAgentClient {
    pub fn new(cfg: &AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: cfg.url.trim().to_string(),
        })
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ask(&self, request: AgentRequest) -> Result<String, AgentError> {
        tracing::debug!(thread_id = %request.thread_id, url = %self.url, "forwarding message to agent");
        let response = self.http.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }

        let reply: AgentReply = response.json().await?;
        Ok(reply.reply)
    }
}
