use anyhow::Result;

use crate::{
    domain::{
        chat::{ChatResponsible, ChatSummary},
        events::ChannelEvent,
        message::Message,
        open_chat_state::HistoryRequest,
    },
    usecases::{
        chat_session::PendingSend,
        load_messages::{LoadMessagesError, MessagesPage},
        send_message::{SendMessageCommand, SendMessageError},
    },
};

/// Everything the session driver reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    OpenChat(ChatSummary),
    LoadOlderMessages,
    SwitchTab(ChatResponsible),
    SendMessage(SendMessageCommand),
    HistoryLoaded {
        request: HistoryRequest,
        result: Result<MessagesPage, LoadMessagesError>,
    },
    SendCompleted {
        pending: PendingSend,
        result: Result<Message, SendMessageError>,
    },
    Channel(ChannelEvent),
    Logout,
    Tick,
    Quit,
}

pub trait SessionEventSource {
    fn next_event(&mut self) -> Result<Option<SessionEvent>>;
}

/// Runs collaborator calls off the driver's thread. Results come back as
/// [`SessionEvent::HistoryLoaded`] and [`SessionEvent::SendCompleted`].
pub trait Dispatcher {
    fn dispatch_history(&mut self, request: HistoryRequest);
    fn dispatch_send(&mut self, pending: PendingSend);
}
