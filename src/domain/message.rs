use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a message inside a chat.
///
/// A message starts as `Pending` while the send is in flight and becomes
/// `Confirmed` once the backend has persisted it. The only transition between
/// the two is `reconciler::replace_temporary_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Confirmed(i64),
    Pending(String),
}

impl MessageId {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn temporary_id(&self) -> Option<&str> {
        match self {
            Self::Pending(id) => Some(id),
            Self::Confirmed(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => write!(f, "{id}"),
            Self::Pending(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    #[default]
    Inbound,
    Outbound,
}

/// Who authored the message from the console's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Ai,
    Worker,
    #[default]
    Customer,
    AutoMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Completed,
    Answered,
    NoAnswer,
    Failed,
    Missed,
    Error,
    Delivered,
    Waiting,
}

impl MessageStatus {
    /// Whether the backend will still move the message to another status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Waiting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Call,
    Location,
    File,
    Audio,
    Video,
    Pdf,
    Docs,
    #[serde(other)]
    Other,
}

impl MessageType {
    /// Returns a display label for non-text messages.
    pub fn display_label(&self) -> Option<&'static str> {
        match self {
            MessageType::Text => None,
            MessageType::Image => Some("[Image]"),
            MessageType::Call => Some("[Call]"),
            MessageType::Location => Some("[Location]"),
            MessageType::File => Some("[File]"),
            MessageType::Audio => Some("[Audio]"),
            MessageType::Video => Some("[Video]"),
            MessageType::Pdf => Some("[PDF]"),
            MessageType::Docs => Some("[Document]"),
            MessageType::Other => Some("[Media]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    Sms,
    Call,
    Whatsapp,
    Email,
    Telegram,
    Slack,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<i64>,
    pub file_url: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_name: String,
}

/// Reference to the message being replied to. Held by id; the preview text is
/// a copy for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyReference {
    pub id: i64,
    #[serde(default, rename = "message")]
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: i64,
    #[serde(rename = "message", default)]
    pub body: String,
    #[serde(default)]
    pub direction: MessageDirection,
    #[serde(default)]
    pub sender: SenderRole,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    /// Raw backend timestamp. Parsed on demand in the viewer's zone.
    pub created_at: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub channel: Option<MessageChannel>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_message: Option<ReplyReference>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Message {
    /// Returns the display content: type label + body, or just the body for text.
    pub fn display_content(&self) -> String {
        match (self.message_type.display_label(), self.body.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.body),
            (None, _) => self.body.clone(),
        }
    }
}

/// A message decorated with its day-grouping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    #[serde(flatten)]
    pub message: Message,
    pub formatted_date_label: String,
    pub show_label: bool,
}

impl DisplayMessage {
    pub fn id(&self) -> &MessageId {
        &self.message.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(body: &str, message_type: MessageType) -> Message {
        Message {
            id: MessageId::Confirmed(1),
            chat_id: 7,
            body: body.to_owned(),
            direction: MessageDirection::Inbound,
            sender: SenderRole::Customer,
            status: None,
            created_at: "2024-01-01 10:00:00".to_owned(),
            message_type,
            channel: None,
            attachments: Vec::new(),
            reply_message: None,
            error_message: None,
        }
    }

    #[test]
    fn message_id_accepts_numbers_and_strings() {
        let confirmed: MessageId = serde_json::from_str("42").expect("numeric id");
        let pending: MessageId = serde_json::from_str("\"tmp-1\"").expect("string id");

        assert_eq!(confirmed, MessageId::Confirmed(42));
        assert_eq!(pending, MessageId::Pending("tmp-1".to_owned()));
        assert!(pending.is_pending());
        assert_eq!(pending.temporary_id(), Some("tmp-1"));
        assert_eq!(confirmed.temporary_id(), None);
    }

    #[test]
    fn deserializes_backend_payload_with_defaults() {
        let raw = r#"{
            "id": 10,
            "chatId": 3,
            "message": "hello",
            "direction": "outbound",
            "sender": "worker",
            "status": "delivered",
            "createdAt": "2024-01-01 10:00:00",
            "messageType": "text",
            "channel": "sms"
        }"#;

        let message: Message = serde_json::from_str(raw).expect("payload should decode");

        assert_eq!(message.id, MessageId::Confirmed(10));
        assert_eq!(message.chat_id, 3);
        assert_eq!(message.body, "hello");
        assert_eq!(message.direction, MessageDirection::Outbound);
        assert_eq!(message.status, Some(MessageStatus::Delivered));
        assert_eq!(message.channel, Some(MessageChannel::Sms));
        assert!(message.attachments.is_empty());
        assert!(message.reply_message.is_none());
    }

    #[test]
    fn unknown_message_type_maps_to_other() {
        let raw = r#"{"id": 1, "chatId": 1, "createdAt": "x", "messageType": "sticker"}"#;

        let message: Message = serde_json::from_str(raw).expect("payload should decode");

        assert_eq!(message.message_type, MessageType::Other);
    }

    #[test]
    fn display_content_combines_type_label_and_body() {
        assert_eq!(msg("Hello", MessageType::Text).display_content(), "Hello");
        assert_eq!(msg("", MessageType::Image).display_content(), "[Image]");
        assert_eq!(
            msg("contract", MessageType::Pdf).display_content(),
            "[PDF] contract"
        );
    }

    #[test]
    fn queued_and_waiting_are_not_terminal() {
        assert!(!MessageStatus::Queued.is_terminal());
        assert!(!MessageStatus::Waiting.is_terminal());
        assert!(MessageStatus::Delivered.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
    }
}
