use anyhow::Result;
use clap::Parser;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tg_moviebot::handlers::{self, PendingGenre};
use tg_moviebot::messenger::{Messenger, TelegramMessenger};
use tg_moviebot::{config, db};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let pending = Arc::new(PendingGenre::default());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    info!("starting telegram bot");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pool, messenger, pending])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn on_message(
    msg: Message,
    pool: SqlitePool,
    messenger: Arc<TelegramMessenger>,
    pending: Arc<PendingGenre>,
) -> HandlerResult {
    // Only text is meaningful for this bot; stickers, media etc. are ignored.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat = msg.chat.id;
    if let Err(err) = handlers::handle_message(&*messenger, &pool, &pending, chat, text).await {
        error!(?err, "failed to handle message");
        // Fail the single request, never the dispatch loop.
        let _ = messenger
            .send_text(chat, "Something went wrong. Please try again.")
            .await;
    }
    Ok(())
}

async fn on_callback(
    query: CallbackQuery,
    pool: SqlitePool,
    messenger: Arc<TelegramMessenger>,
) -> HandlerResult {
    let Some(payload) = query.data.as_deref() else {
        return Ok(());
    };
    // The press is bound to the chat the card was sent to; without the origin
    // message there is no user to bookmark for.
    let Some(chat) = query.message.as_ref().map(|m| m.chat.id) else {
        warn!(callback_id = %query.id, "callback without origin message");
        let _ = messenger
            .answer_callback(&query.id, "Sorry, I can't process this action.", false)
            .await;
        return Ok(());
    };
    if let Err(err) = handlers::handle_callback(&*messenger, &pool, chat, &query.id, payload).await
    {
        error!(?err, "failed to handle callback");
        let _ = messenger
            .answer_callback(&query.id, "Something went wrong. Please try again.", false)
            .await;
    }
    Ok(())
}
