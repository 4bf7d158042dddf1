//! Outbound messaging seam.
//!
//! Handlers talk to Telegram through the [`Messenger`] trait instead of a
//! concrete `Bot`, so dispatch logic can be exercised in tests with a
//! recording double. [`TelegramMessenger`] is the real implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, KeyboardMarkup};
use url::Url;

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Text message carrying the persistent reply keyboard.
    async fn send_text_with_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: KeyboardMarkup,
    ) -> Result<()>;

    /// A movie card: photo first, then the caption text with its inline
    /// "add to favorite" control attached.
    async fn send_movie(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        buttons: InlineKeyboardMarkup,
    ) -> Result<()>;

    /// Ephemeral acknowledgement of a button press. `show_alert` switches
    /// between a toast and a modal alert.
    async fn answer_callback(&self, callback_id: &str, text: &str, show_alert: bool) -> Result<()>;
}

/// Production messenger wrapping a teloxide [`Bot`]. Constructed once in
/// `main` and passed to handlers; nothing else owns a bot instance.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl fmt::Debug for TelegramMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramMessenger").finish_non_exhaustive()
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(chat, text).await?;
        Ok(())
    }

    async fn send_text_with_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: KeyboardMarkup,
    ) -> Result<()> {
        self.bot
            .send_message(chat, text)
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }

    async fn send_movie(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        buttons: InlineKeyboardMarkup,
    ) -> Result<()> {
        let url = Url::parse(photo_url)
            .with_context(|| format!("invalid movie image url: {photo_url}"))?;
        self.bot.send_photo(chat, InputFile::url(url)).await?;
        self.bot
            .send_message(chat, caption)
            .reply_markup(buttons)
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str, show_alert: bool) -> Result<()> {
        self.bot
            .answer_callback_query(callback_id)
            .text(text)
            .show_alert(show_alert)
            .await?;
        Ok(())
    }
}
