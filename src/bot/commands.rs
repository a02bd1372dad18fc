use std::sync::Arc;

use tracing::{error, info, warn};

use super::agent::{AgentClient, AgentRequest};
use crate::{db::dao::ClaimResult, error::AppError, services::ServiceContext};

pub const START_REPLY: &str = "Hello! I am your LLM agent MCP bot. Send me a message!";
pub const HELP_REPLY: &str = "/start - say hello\n\
/token <token> - register a token\n\
/revoke <token> - revoke one of your tokens\n\
/tokens - list your tokens and what they allow\n\
Anything else is sent to the agent.";
pub const MISSING_ARGUMENT_REPLY: &str = "No parameters passed to the command, however expected one";
pub const INVALID_TOKEN_REPLY: &str = "Passed token is not valid, please check that it is correct";
pub const NOT_REGISTERED_REPLY: &str =
    "You are not registered yet. Send /token <token> to register.";
pub const FORBIDDEN_REPLY: &str = "Your tokens do not allow talking to the agent.";
pub const AGENT_UNAVAILABLE_REPLY: &str = "Sorry, the agent is not available right now.";
pub const INTERNAL_ERROR_REPLY: &str = "Something went wrong, please try again later.";
pub const UNKNOWN_COMMAND_REPLY: &str = "Unknown command. Send /help to see what I can do.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Token(Option<String>),
    Revoke(Option<String>),
    Tokens,
    Unknown(String),
    Text(String),
}

impl Command {
    /// Parses `/name[@bot] [args]`. Anything not starting with `/` is free text.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let first_arg = args.split_whitespace().next().map(str::to_string);

        match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "token" => Self::Token(first_arg),
            "revoke" => Self::Revoke(first_arg),
            "tokens" => Self::Tokens,
            _ => Self::Unknown(name),
        }
    }
}

/// Who sent a message.
#[derive(Debug, Clone)]
pub struct Sender {
    pub user_id: String,
    pub chat_id: i64,
    pub display_name: String,
}

/// Turns incoming chat text into a reply. Knows nothing about Telegram.
#[derive(Clone)]
pub struct CommandHandler {
    services: ServiceContext,
    agent: Arc<dyn AgentClient>,
    required_action: Option<String>,
}

impl CommandHandler {
    pub fn new(
        services: ServiceContext,
        agent: Arc<dyn AgentClient>,
        required_action: Option<String>,
    ) -> Self {
        Self {
            services,
            agent,
            required_action,
        }
    }

    /// Returns the reply to send back, or `None` when there is nothing to say.
    pub async fn handle(&self, sender: &Sender, text: &str) -> Option<String> {
        let reply = match Command::parse(text) {
            Command::Start => {
                info!(user_id = %sender.user_id, "user started bot");
                Ok(START_REPLY.to_string())
            }
            Command::Help => Ok(HELP_REPLY.to_string()),
            Command::Token(None) | Command::Revoke(None) => {
                warn!(user_id = %sender.user_id, "command is missing its argument");
                Ok(MISSING_ARGUMENT_REPLY.to_string())
            }
            Command::Token(Some(token_id)) => self.register_token(sender, &token_id).await,
            Command::Revoke(Some(token_id)) => self.revoke_token(sender, &token_id).await,
            Command::Tokens => self.list_tokens(sender).await,
            Command::Unknown(name) => {
                info!(user_id = %sender.user_id, command = %name, "unknown command");
                Ok(UNKNOWN_COMMAND_REPLY.to_string())
            }
            Command::Text(text) if text.is_empty() => return None,
            Command::Text(text) => self.forward_to_agent(sender, text).await,
        };

        Some(reply.unwrap_or_else(|err| {
            error!(user_id = %sender.user_id, error = %err, "failed to handle message");
            INTERNAL_ERROR_REPLY.to_string()
        }))
    }

    async fn register_token(&self, sender: &Sender, token_id: &str) -> Result<String, AppError> {
        let result = self
            .services
            .auth()
            .claim_or_validate(token_id, &sender.user_id, &sender.display_name)
            .await?;

        let reply = match result {
            ClaimResult::TokenNotFound | ClaimResult::OwnershipConflict => {
                warn!(user_id = %sender.user_id, %result, "rejected token");
                INVALID_TOKEN_REPLY.to_string()
            }
            ClaimResult::NewUserBound => format!(
                "Welcome, {}! Your token is registered.",
                sender.display_name
            ),
            ClaimResult::TokenAddedToExistingUser => "Token added to your account.".to_string(),
            ClaimResult::AlreadyRegistered => "This token is already registered to you.".to_string(),
            ClaimResult::OwnershipConfirmed => "Token confirmed, it belongs to you.".to_string(),
        };
        Ok(reply)
    }

    async fn revoke_token(&self, sender: &Sender, token_id: &str) -> Result<String, AppError> {
        let revoked = self
            .services
            .auth()
            .revoke_token(&sender.user_id, token_id)
            .await?;
        Ok(if revoked {
            "Token revoked.".to_string()
        } else {
            "You do not have a token with that id.".to_string()
        })
    }

    async fn list_tokens(&self, sender: &Sender) -> Result<String, AppError> {
        let holdings = self.services.auth().holdings(&sender.user_id).await?;
        if holdings.is_empty() {
            return Ok("You have no tokens yet. Send /token <token> to register one.".to_string());
        }

        let lines: Vec<String> = holdings
            .into_iter()
            .map(|holding| {
                let actions = if holding.actions.is_empty() {
                    "no actions".to_string()
                } else {
                    holding.actions.into_iter().collect::<Vec<_>>().join(", ")
                };
                format!("{}: {actions}", holding.token_id)
            })
            .collect();
        Ok(format!("Your tokens:\n{}", lines.join("\n")))
    }

    async fn forward_to_agent(&self, sender: &Sender, text: String) -> Result<String, AppError> {
        let auth = self.services.auth();
        if !auth.user_exists(&sender.user_id).await? {
            info!(user_id = %sender.user_id, "message from unregistered user");
            return Ok(NOT_REGISTERED_REPLY.to_string());
        }
        if let Some(action) = self.required_action.as_deref() {
            if !auth.has_action(&sender.user_id, action).await? {
                warn!(user_id = %sender.user_id, action, "user lacks the required action");
                return Ok(FORBIDDEN_REPLY.to_string());
            }
        }

        let request = AgentRequest {
            thread_id: sender.chat_id.to_string(),
            user_id: sender.user_id.clone(),
            message: text,
        };
        match self.agent.ask(request).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                error!(user_id = %sender.user_id, error = %err, "agent call failed");
                Ok(AGENT_UNAVAILABLE_REPLY.to_string())
            }
        }
    }
}
