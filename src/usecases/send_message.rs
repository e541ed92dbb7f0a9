//! Use case for sending a message to a chat.
//!
//! The backend answers a send with the persisted message, which is what the
//! optimistic entry is later swapped for.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::message::Message;

/// Command to send a message to a specific chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageCommand {
    pub chat_id: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_message_id: Option<i64>,
}

impl SendMessageCommand {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_message_id: None,
        }
    }
}

/// Errors reported by the backend adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMessageSourceError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("chat not found")]
    ChatNotFound,
    #[error("unavailable")]
    Unavailable,
    #[error("rejected by provider")]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    #[error("message is empty")]
    EmptyMessage,
    #[error("not authorized to send messages")]
    Unauthorized,
    #[error("chat not found")]
    ChatNotFound,
    #[error("message could not be sent, try again later")]
    TemporarilyUnavailable,
    #[error("message was rejected by the provider")]
    Rejected,
}

impl SendMessageError {
    pub fn code(self) -> &'static str {
        match self {
            Self::EmptyMessage => "SEND_EMPTY_MESSAGE",
            Self::Unauthorized => "SEND_UNAUTHORIZED",
            Self::ChatNotFound => "SEND_CHAT_NOT_FOUND",
            Self::TemporarilyUnavailable => "SEND_UNAVAILABLE",
            Self::Rejected => "SEND_REJECTED",
        }
    }
}

pub trait MessageSender {
    /// Delivers `command` and returns the message as the server stored it.
    fn send_message(&self, command: &SendMessageCommand) -> Result<Message, SendMessageSourceError>;
}

impl<T: MessageSender + ?Sized> MessageSender for &T {
    fn send_message(&self, command: &SendMessageCommand) -> Result<Message, SendMessageSourceError> {
        (*self).send_message(command)
    }
}

/// Trims the text and rejects commands with nothing left to send.
pub fn validate(command: SendMessageCommand) -> Result<SendMessageCommand, SendMessageError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    Ok(SendMessageCommand {
        text: text.to_owned(),
        ..command
    })
}

pub fn send_message(
    sender: &dyn MessageSender,
    command: SendMessageCommand,
) -> Result<Message, SendMessageError> {
    let command = validate(command)?;
    sender.send_message(&command).map_err(map_source_error)
}

pub fn map_source_error(error: SendMessageSourceError) -> SendMessageError {
    match error {
        SendMessageSourceError::Unauthorized => SendMessageError::Unauthorized,
        SendMessageSourceError::ChatNotFound => SendMessageError::ChatNotFound,
        SendMessageSourceError::Unavailable => SendMessageError::TemporarilyUnavailable,
        SendMessageSourceError::Rejected => SendMessageError::Rejected,
    }
}
