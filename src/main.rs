use std::{future::IntoFuture, net::SocketAddr, sync::Arc};

use anyhow::Context;
use teloxide::Bot;

use tg_agent_bot::{
    bot::{CommandHandler, HttpAgentClient, Messenger, TelegramMessenger, telegram::run_polling},
    config::AppConfig,
    db::connection,
    logging::init_tracing,
    routes::app,
    services::ServiceContext,
    state::AppState,
};

#[tokio::main]
async fn main() {
    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load config: {err:?}");
            std::process::exit(1);
        }
    };
    init_tracing(&cfg.logging.rust_log);

    if let Err(err) = run(cfg).await {
        tracing::error!("bot failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let db = connection::connect(cfg.require_database()?).await?;

    let bot = Bot::new(cfg.require_telegram()?.bot_token.clone());
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let agent = Arc::new(HttpAgentClient::new(&cfg.agent)?);
    let handler = Arc::new(CommandHandler::new(
        ServiceContext::new(&db),
        agent,
        cfg.bot.required_action.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port)
        .parse()
        .context("invalid general.host/general.port")?;
    let state = AppState::new(cfg, db, Arc::clone(&messenger));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("tool server listening on http://{}", addr);

    tokio::select! {
        served = axum::serve(listener, app(state)).into_future() => served?,
        polled = run_polling(bot, handler, messenger) => polled?,
    }
    Ok(())
}
