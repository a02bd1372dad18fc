pub mod agent;
pub mod commands;
pub mod messenger;
pub mod telegram;

pub use agent::{AgentClient, AgentError, AgentRequest, HttpAgentClient};
pub use commands::{Command, CommandHandler, Sender};
pub use messenger::{Messenger, MessengerError, TelegramMessenger};
