use crate::db::{self, FavoriteOutcome, Movie};
use crate::messenger::Messenger;
use crate::render;
use anyhow::Result;
use rand::seq::SliceRandom;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Mutex;
use teloxide::types::ChatId;
use tracing::{info, instrument, warn};

const WELCOME: &str = "\
Hello! You're welcome to the best Movie-Chat-Bot🎥!
Here you can find 1000 movies 🔥
Click /random to get a random movie
Or write the title of the movie and I will try to find it! 🎬";

/// Users whose next free-text message is consumed as a genre filter.
///
/// This is the only piece of conversational state in the process: a per-user,
/// single-shot continuation established by `/random_genre`. A recognized
/// command discards it; the next free-text message consumes it, whatever its
/// content. It never leaks across users and never survives past one message.
#[derive(Debug, Default)]
pub struct PendingGenre {
    waiting: Mutex<HashSet<ChatId>>,
}

impl PendingGenre {
    /// Arm the continuation. Re-issuing `/random_genre` overwrites silently.
    pub fn set(&self, chat: ChatId) {
        self.waiting.lock().unwrap().insert(chat);
    }

    /// Consume the continuation if armed. Returns whether it was.
    pub fn take(&self, chat: ChatId) -> bool {
        self.waiting.lock().unwrap().remove(&chat)
    }

    /// Discard without consuming (recognized command arrived instead).
    pub fn discard(&self, chat: ChatId) {
        self.waiting.lock().unwrap().remove(&chat);
    }
}

/// Route one inbound text message. The chat id doubles as the user id for
/// favorites, matching the one-user-per-private-chat Telegram model.
#[instrument(skip_all, fields(chat = chat.0))]
pub async fn handle_message(
    messenger: &dyn Messenger,
    pool: &SqlitePool,
    pending: &PendingGenre,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    let trimmed = text.trim();

    // Strip a bot-name suffix so "/random@SomeBot" routes like "/random".
    let command = match trimmed.split_once('@') {
        Some((cmd, _)) if trimmed.starts_with('/') => cmd,
        _ => trimmed,
    };

    match command {
        "/start" => {
            pending.discard(chat);
            messenger
                .send_text_with_keyboard(chat, WELCOME, render::main_keyboard())
                .await?;
        }
        "/random" => {
            pending.discard(chat);
            match db::random_movie(pool).await? {
                Some(movie) => send_movie_card(messenger, chat, &movie).await?,
                None => {
                    messenger
                        .send_text(chat, "Unfortunately, there are no movies in the database.")
                        .await?;
                }
            }
        }
        "/random_genre" => {
            pending.set(chat);
            messenger
                .send_text(chat, "Please enter a movie genre:")
                .await?;
        }
        "/favorites" => {
            pending.discard(chat);
            let favorites = db::favorites_for_user(pool, chat.0).await?;
            if favorites.is_empty() {
                messenger
                    .send_text(chat, "You don't have any favorite movies yet.")
                    .await?;
            } else {
                for movie in &favorites {
                    send_movie_card(messenger, chat, movie).await?;
                }
            }
        }
        _ => {
            if pending.take(chat) {
                genre_continuation(messenger, pool, chat, trimmed).await?;
            } else {
                title_search(messenger, pool, chat, trimmed).await?;
            }
        }
    }
    Ok(())
}

/// Second step of `/random_genre`: the message body is the genre filter.
async fn genre_continuation(
    messenger: &dyn Messenger,
    pool: &SqlitePool,
    chat: ChatId,
    genre: &str,
) -> Result<()> {
    let genre = genre.to_lowercase();
    let matches = db::movies_by_genre(pool, &genre).await?;
    let chosen = matches.choose(&mut rand::thread_rng());
    match chosen {
        Some(movie) => send_movie_card(messenger, chat, movie).await?,
        None => {
            messenger
                .send_text(chat, "Unfortunately, there are no movies in this genre.")
                .await?;
        }
    }
    Ok(())
}

/// Any free text that is not a continuation is a title substring search.
/// More than five matches asks the user to narrow instead of flooding the
/// chat with cards.
async fn title_search(
    messenger: &dyn Messenger,
    pool: &SqlitePool,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    let matches = db::movies_by_title(pool, &text.to_lowercase()).await?;
    if matches.is_empty() {
        messenger.send_text(chat, "I don't know this movie 😔").await?;
    } else if matches.len() > 5 {
        messenger
            .send_text(
                chat,
                &format!(
                    "Found too many movies ({}). Please narrow your query.",
                    matches.len()
                ),
            )
            .await?;
    } else {
        messenger
            .send_text(chat, "Of course! I know this movie😌")
            .await?;
        for movie in &matches {
            send_movie_card(messenger, chat, movie).await?;
        }
    }
    Ok(())
}

/// Handle an inline-button press. Reachable from any dispatcher state and
/// deliberately independent of the pending-genre continuation.
#[instrument(skip_all, fields(chat = chat.0))]
pub async fn handle_callback(
    messenger: &dyn Messenger,
    pool: &SqlitePool,
    chat: ChatId,
    callback_id: &str,
    payload: &str,
) -> Result<()> {
    let Some(movie_id) = render::parse_favorite_payload(payload) else {
        warn!(payload, "malformed callback payload");
        messenger
            .answer_callback(callback_id, "Sorry, I can't process this action.", false)
            .await?;
        return Ok(());
    };

    match db::add_favorite(pool, chat.0, movie_id).await? {
        FavoriteOutcome::Added => {
            info!(movie_id, user_id = chat.0, "movie added to favorites");
            messenger
                .answer_callback(callback_id, "Movie added to favorites! 🎉", false)
                .await?;
        }
        FavoriteOutcome::AlreadyExists => {
            messenger
                .answer_callback(callback_id, "This movie is already in your favorites!", true)
                .await?;
        }
    }
    Ok(())
}

async fn send_movie_card(messenger: &dyn Messenger, chat: ChatId, movie: &Movie) -> Result<()> {
    messenger
        .send_movie(
            chat,
            &movie.img,
            &render::movie_caption(movie),
            render::favorite_button(movie.id),
        )
        .await
}
