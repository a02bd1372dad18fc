use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::User};

use super::{CommandHandler, Messenger, Sender};

/// Long-polls Telegram until ctrl-c, answering every text message through
/// the command handler.
pub async fn run_polling(
    bot: Bot,
    handler: Arc<CommandHandler>,
    messenger: Arc<dyn Messenger>,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram bot started"),
        Err(err) => tracing::warn!(error = %err, "could not fetch bot identity"),
    }

    let tree = Update::filter_message().endpoint(on_message);

    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![handler, messenger])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("telegram dispatcher stopped");
    Ok(())
}

async fn on_message(
    msg: Message,
    handler: Arc<CommandHandler>,
    messenger: Arc<dyn Messenger>,
) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let sender = Sender {
        user_id: user.id.0.to_string(),
        chat_id: msg.chat.id.0,
        display_name: display_name(user),
    };

    if let Some(reply) = handler.handle(&sender, text).await {
        if let Err(err) = messenger.send_message(sender.chat_id, &reply).await {
            tracing::error!(chat_id = sender.chat_id, error = %err, "failed to send reply");
        }
    }
    Ok(())
}

fn display_name(user: &User) -> String {
    match user.username.as_deref() {
        Some(username) if !username.is_empty() => username.to_string(),
        _ => user.full_name(),
    }
}
