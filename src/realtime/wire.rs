//! Decoding of push frames.
//!
//! Frames follow the pusher envelope: `{"event": ..., "channel": ..., "data": ...}`
//! where `data` is either an object or a JSON document encoded as a string.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    chat::ChatSummary,
    events::ChannelEvent,
    message::{Message, MessageId, MessageStatus},
};

pub const EVENT_MESSAGE_CREATED: &str = "message.created";
pub const EVENT_MESSAGE_UPDATED: &str = "message.updated";
pub const EVENT_MESSAGE_STATUS: &str = "message.status";
pub const EVENT_CHAT_REASSIGNED: &str = "chat.reassigned";

const PROTOCOL_EVENT_PREFIXES: [&str; 2] = ["pusher:", "pusher_internal:"];

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed frame envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed payload for event {event}: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketMessage {
    #[serde(flatten)]
    message: Message,
    #[serde(default)]
    chat_message_id: Option<i64>,
    #[serde(default)]
    chat: Option<ChatSummary>,
}

impl SocketMessage {
    fn into_message(self) -> (Message, Option<ChatSummary>) {
        let mut message = self.message;
        if let Some(id) = self.chat_message_id {
            message.id = MessageId::Confirmed(id);
        }
        (message, self.chat)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    chat_id: i64,
    #[serde(alias = "chatMessageId")]
    id: MessageId,
    status: MessageStatus,
}

#[derive(Debug, Deserialize)]
struct ReassignedPayload {
    chat: ChatSummary,
}

/// Decodes one frame. Protocol housekeeping and unknown events yield `None`.
pub fn decode_frame(raw: &str) -> Result<Option<ChannelEvent>, WireError> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(WireError::Envelope)?;

    if PROTOCOL_EVENT_PREFIXES
        .iter()
        .any(|prefix| envelope.event.starts_with(prefix))
    {
        return Ok(None);
    }

    let event = envelope.event.as_str();
    let data = envelope.data;

    let decoded = match event {
        EVENT_MESSAGE_CREATED => {
            let (message, chat) = payload::<SocketMessage>(event, data)?.into_message();
            ChannelEvent::MessageCreated { message, chat }
        }
        EVENT_MESSAGE_UPDATED => {
            let (message, _) = payload::<SocketMessage>(event, data)?.into_message();
            ChannelEvent::MessageUpdated { message }
        }
        EVENT_MESSAGE_STATUS => {
            let status = payload::<StatusPayload>(event, data)?;
            ChannelEvent::MessageStatusChanged {
                chat_id: status.chat_id,
                message_id: status.id,
                status: status.status,
            }
        }
        EVENT_CHAT_REASSIGNED => ChannelEvent::ChatReassigned {
            chat: payload::<ReassignedPayload>(event, data)?.chat,
        },
        other => {
            tracing::debug!(event = other, "ignoring unknown channel event");
            return Ok(None);
        }
    };

    Ok(Some(decoded))
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, WireError> {
    let result = match data {
        Value::String(encoded) => serde_json::from_str(&encoded),
        other => serde_json::from_value(other),
    };

    result.map_err(|source| WireError::Payload {
        event: event.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatResponsible;

    #[test]
    fn decodes_message_created_with_chat_row() {
        let raw = r#"{
            "event": "message.created",
            "channel": "private-inbox.1",
            "data": {
                "id": 5,
                "chatMessageId": 501,
                "chatId": 9,
                "message": "on my way",
                "sender": "customer",
                "createdAt": "2024-01-01 10:00:00",
                "chat": {"id": 9, "fullName": "Driver Joe", "responsible": "worker"}
            }
        }"#;

        let event = decode_frame(raw).expect("frame decodes").expect("event present");

        let ChannelEvent::MessageCreated { message, chat } = event else {
            panic!("expected message created event");
        };
        assert_eq!(message.id, MessageId::Confirmed(501));
        assert_eq!(message.chat_id, 9);
        assert_eq!(message.body, "on my way");
        let chat = chat.expect("chat row present");
        assert_eq!(chat.title, "Driver Joe");
        assert_eq!(chat.responsible, ChatResponsible::Worker);
    }

    #[test]
    fn decodes_string_encoded_payload() {
        let raw = r#"{
            "event": "message.status",
            "data": "{\"chatId\": 3, \"id\": 44, \"status\": \"delivered\"}"
        }"#;

        let event = decode_frame(raw).expect("frame decodes");

        assert_eq!(
            event,
            Some(ChannelEvent::MessageStatusChanged {
                chat_id: 3,
                message_id: MessageId::Confirmed(44),
                status: MessageStatus::Delivered,
            })
        );
    }

    #[test]
    fn decodes_chat_reassignment() {
        let raw = r#"{"event": "chat.reassigned", "data": {"chat": {"id": 2, "responsible": "ai"}}}"#;

        let event = decode_frame(raw).expect("frame decodes").expect("event present");

        assert_eq!(event.chat_id(), 2);
        assert_eq!(event.kind(), "chat_reassigned");
    }

    #[test]
    fn protocol_and_unknown_events_are_skipped() {
        let subscribed = r#"{"event": "pusher_internal:subscription_succeeded", "data": {}}"#;
        let unknown = r#"{"event": "lead.updated", "data": {"id": 1}}"#;

        assert_eq!(decode_frame(subscribed).expect("frame decodes"), None);
        assert_eq!(decode_frame(unknown).expect("frame decodes"), None);
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            decode_frame("not json"),
            Err(WireError::Envelope(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"event": "message.created", "data": {"id": 1}}"#),
            Err(WireError::Payload { .. })
        ));
    }
}
