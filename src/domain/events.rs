use super::{
    chat::ChatSummary,
    message::{Message, MessageId, MessageStatus},
};

/// A decoded push event from the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A message was persisted. `chat` carries the list row when the backend
    /// includes it.
    MessageCreated {
        message: Message,
        chat: Option<ChatSummary>,
    },
    MessageUpdated {
        message: Message,
    },
    MessageStatusChanged {
        chat_id: i64,
        message_id: MessageId,
        status: MessageStatus,
    },
    /// The chat was handed over between the AI and worker queues.
    ChatReassigned {
        chat: ChatSummary,
    },
}

impl ChannelEvent {
    pub fn chat_id(&self) -> i64 {
        match self {
            Self::MessageCreated { message, .. } | Self::MessageUpdated { message } => {
                message.chat_id
            }
            Self::MessageStatusChanged { chat_id, .. } => *chat_id,
            Self::ChatReassigned { chat } => chat.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageStatusChanged { .. } => "message_status_changed",
            Self::ChatReassigned { .. } => "chat_reassigned",
        }
    }
}
