use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use sea_orm::DatabaseConnection;

use crate::{
    bot::{AgentClient, AgentError, AgentRequest, CommandHandler, Messenger, MessengerError},
    config::{AppConfig, DatabaseConfig},
    db::connection,
    routes::app,
    services::ServiceContext,
    state::AppState,
};

/// Fresh in-memory SQLite database with the schema applied.
pub async fn memory_db() -> DatabaseConnection {
    let cfg = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_idle: 1,
    };
    connection::connect(&cfg)
        .await
        .expect("in-memory sqlite should open")
}

/// Agent stand-in that records requests and answers with a fixed reply.
#[derive(Default)]
pub struct FakeAgent {
    reply: Option<String>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl FakeAgent {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::default(),
        })
    }

    /// Every call fails with a 503.
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl AgentClient for FakeAgent {
    async fn ask(&self, request: AgentRequest) -> Result<String, AgentError> {
        self.requests.lock().expect("requests lock").push(request);
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(AgentError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "agent is down".to_string(),
            }),
        }
    }
}

/// Messenger stand-in that records what would have been sent.
#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<(i64, String)>>,
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        if text.trim().is_empty() {
            return Err(MessengerError::Rejected("message text is empty".to_string()));
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push((chat_id, text.to_string()));
        Ok(())
    }
}

pub fn command_handler(
    db: &DatabaseConnection,
    agent: Arc<FakeAgent>,
    required_action: Option<&str>,
) -> CommandHandler {
    CommandHandler::new(
        ServiceContext::new(db),
        agent,
        required_action.map(str::to_string),
    )
}

/// Tool server over `db`, with a recording messenger.
pub fn test_app(db: DatabaseConnection) -> (Router, Arc<FakeMessenger>) {
    let messenger = Arc::new(FakeMessenger::default());
    let state = AppState::new(AppConfig::default(), db, messenger.clone());
    (app(state), messenger)
}
