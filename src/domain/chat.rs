use serde::{Deserialize, Serialize};

use super::message::Message;

/// Which queue a chat belongs to. The two tabs are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatResponsible {
    /// Conversations handled by the automated assistant.
    Ai,
    /// Conversations assigned to a human operator.
    #[default]
    Worker,
}

impl ChatResponsible {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Worker => "worker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: i64,
    #[serde(default)]
    pub lead_id: Option<i64>,
    #[serde(default, alias = "fullName")]
    pub title: String,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default, alias = "unreadMessagesCount")]
    pub unread_count: u32,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub responsible: ChatResponsible,
}

impl ChatSummary {
    /// Updates the list-row preview from a message that just arrived.
    pub fn record_activity(&mut self, message: &Message) {
        self.last_message_preview = Some(message.display_content());
        self.last_message_at = Some(message.created_at.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{MessageId, MessageType};

    #[test]
    fn decodes_list_row_with_backend_aliases() {
        let raw = r#"{
            "id": 4,
            "leadId": 12,
            "fullName": "Jane Carrier",
            "unreadMessagesCount": 3,
            "isPinned": true,
            "responsible": "ai"
        }"#;

        let chat: ChatSummary = serde_json::from_str(raw).expect("chat should decode");

        assert_eq!(chat.id, 4);
        assert_eq!(chat.lead_id, Some(12));
        assert_eq!(chat.title, "Jane Carrier");
        assert_eq!(chat.unread_count, 3);
        assert!(chat.is_pinned);
        assert_eq!(chat.responsible, ChatResponsible::Ai);
    }

    #[test]
    fn responsible_defaults_to_worker() {
        let chat: ChatSummary = serde_json::from_str(r#"{"id": 1}"#).expect("chat should decode");

        assert_eq!(chat.responsible, ChatResponsible::Worker);
    }

    #[test]
    fn record_activity_updates_preview() {
        let mut chat: ChatSummary =
            serde_json::from_str(r#"{"id": 1}"#).expect("chat should decode");
        let message = Message {
            id: MessageId::Confirmed(5),
            chat_id: 1,
            body: String::new(),
            direction: Default::default(),
            sender: Default::default(),
            status: None,
            created_at: "2024-01-01 10:00:00".to_owned(),
            message_type: MessageType::Image,
            channel: None,
            attachments: Vec::new(),
            reply_message: None,
            error_message: None,
        };

        chat.record_activity(&message);

        assert_eq!(chat.last_message_preview.as_deref(), Some("[Image]"));
        assert_eq!(chat.last_message_at.as_deref(), Some("2024-01-01 10:00:00"));
    }
}
