//! Transport capability.
//!
//! Handlers reach Telegram only through [`Transport`]: send, reply, edit,
//! callback acknowledgment and the command list. [`TelegramTransport`] is the
//! teloxide-backed implementation used in production.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, CallbackQueryId, ChatId, InlineKeyboardMarkup, MessageId, ParseMode,
    ReplyParameters,
};
use thiserror::Error;

/// Errors returned by transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Telegram rejected the request or could not be reached
    #[error("Telegram API error: {0}")]
    Api(String),
}

impl From<teloxide::RequestError> for TransportError {
    fn from(e: teloxide::RequestError) -> Self {
        Self::Api(e.to_string())
    }
}

/// Address of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    /// Chat the message lives in
    pub chat_id: ChatId,
    /// Message id within the chat
    pub message_id: MessageId,
}

impl MessageHandle {
    /// Create a handle from raw ids.
    #[must_use]
    pub const fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// An outbound message body.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    /// Message text
    pub text: String,
    /// Parse mode; `None` sends plain text
    pub parse_mode: Option<ParseMode>,
    /// Inline keyboard attached to the message
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Outgoing {
    /// HTML message, the default presentation.
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: Some(ParseMode::Html),
            keyboard: None,
        }
    }

    /// Plain text message without markup parsing.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    /// Attach an inline keyboard.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outbound messaging primitives of the chat transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a new message to a chat
    async fn send(&self, chat_id: ChatId, message: Outgoing)
        -> Result<MessageHandle, TransportError>;
    /// Send a message as a reply to another message
    async fn reply(
        &self,
        to: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError>;
    /// Replace the content of an existing message
    async fn edit(
        &self,
        target: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError>;
    /// Acknowledge a callback query, optionally with a non-alerting toast
    async fn answer_callback(
        &self,
        callback_id: String,
        text: Option<String>,
    ) -> Result<(), TransportError>;
    /// Publish the command list shown by clients
    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<(), TransportError>;
}

/// [`Transport`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a teloxide bot.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(
        &self,
        chat_id: ChatId,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError> {
        let mut req = self.bot.send_message(chat_id, message.text);
        if let Some(pm) = message.parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(keyboard) = message.keyboard {
            req = req.reply_markup(keyboard);
        }
        let sent = req.await?;
        Ok(MessageHandle::new(sent.chat.id, sent.id))
    }

    async fn reply(
        &self,
        to: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError> {
        let mut req = self
            .bot
            .send_message(to.chat_id, message.text)
            .reply_parameters(ReplyParameters::new(to.message_id).allow_sending_without_reply());
        if let Some(pm) = message.parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(keyboard) = message.keyboard {
            req = req.reply_markup(keyboard);
        }
        let sent = req.await?;
        Ok(MessageHandle::new(sent.chat.id, sent.id))
    }

    async fn edit(
        &self,
        target: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError> {
        let mut req = self
            .bot
            .edit_message_text(target.chat_id, target.message_id, message.text);
        if let Some(pm) = message.parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(keyboard) = message.keyboard {
            req = req.reply_markup(keyboard);
        }
        match req.await {
            Ok(_) => Ok(target),
            Err(e) => {
                if e.to_string().contains("message is not modified") {
                    return Ok(target);
                }
                Err(e.into())
            }
        }
    }

    async fn answer_callback(
        &self,
        callback_id: String,
        text: Option<String>,
    ) -> Result<(), TransportError> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id))
            .show_alert(false);
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await?;
        Ok(())
    }

    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<(), TransportError> {
        self.bot.set_my_commands(commands).await?;
        Ok(())
    }
}
