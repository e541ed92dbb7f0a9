use serde::Serialize;

use super::{
    chat::{ChatResponsible, ChatSummary},
    reconciler::MessageSequence,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenChatUiState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// Message pagination of the open chat. `page` is the last page merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationCursor {
    pub page: u32,
    pub has_more_pages: bool,
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_more_pages: false,
        }
    }
}

/// Ticket for one outstanding history fetch.
///
/// The response is only merged while this exact ticket is still the one the
/// session is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub id: u64,
    pub chat_id: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Process-wide "what the operator is looking at" state.
///
/// Created empty at start, populated by `open`, and reset by `clear` on logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    active_chat: Option<ChatSummary>,
    sequence: Option<MessageSequence>,
    cursor: PaginationCursor,
    ui_state: OpenChatUiState,
    in_flight: Option<HistoryRequest>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            active_chat: None,
            sequence: None,
            cursor: PaginationCursor::default(),
            ui_state: OpenChatUiState::Empty,
            in_flight: None,
        }
    }
}

impl SessionContext {
    pub fn active_chat(&self) -> Option<&ChatSummary> {
        self.active_chat.as_ref()
    }

    pub fn active_chat_id(&self) -> Option<i64> {
        self.active_chat.as_ref().map(|chat| chat.id)
    }

    pub fn sequence(&self) -> Option<&MessageSequence> {
        self.sequence.as_ref()
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn ui_state(&self) -> OpenChatUiState {
        self.ui_state
    }

    pub fn in_flight(&self) -> Option<&HistoryRequest> {
        self.in_flight.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.active_chat.is_some()
    }

    /// Switches to `chat`, dropping the previous chat's messages and cursor.
    pub fn open(&mut self, chat: ChatSummary, first_page: HistoryRequest) {
        self.sequence = Some(MessageSequence::empty(chat.id));
        self.active_chat = Some(chat);
        self.cursor = PaginationCursor::default();
        self.ui_state = OpenChatUiState::Loading;
        self.in_flight = Some(first_page);
    }

    pub fn begin_fetch(&mut self, request: HistoryRequest) {
        self.in_flight = Some(request);
    }

    /// Whether a response to `request` may still be merged.
    pub fn accepts(&self, request: &HistoryRequest) -> bool {
        self.active_chat_id() == Some(request.chat_id)
            && self.in_flight.as_ref().map(|pending| pending.id) == Some(request.id)
    }

    pub fn apply_page(&mut self, sequence: MessageSequence, page: u32, has_more_pages: bool) {
        self.sequence = Some(sequence);
        self.cursor = PaginationCursor {
            page,
            has_more_pages,
        };
        self.ui_state = OpenChatUiState::Ready;
        self.in_flight = None;
    }

    /// Ends a failed fetch. Messages and cursor stay as they were.
    pub fn fail_fetch(&mut self) {
        if self.sequence.as_ref().map_or(true, MessageSequence::is_empty) {
            self.ui_state = OpenChatUiState::Error;
        }
        self.in_flight = None;
    }

    pub fn replace_sequence(&mut self, sequence: MessageSequence) {
        if self.active_chat_id() == Some(sequence.chat_id()) {
            self.sequence = Some(sequence);
        }
    }

    pub fn set_active_responsible(&mut self, responsible: ChatResponsible) {
        if let Some(chat) = self.active_chat.as_mut() {
            chat.responsible = responsible;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: i64) -> ChatSummary {
        ChatSummary {
            id,
            lead_id: None,
            title: format!("chat {id}"),
            last_message_preview: None,
            last_message_at: None,
            unread_count: 0,
            is_pinned: false,
            responsible: ChatResponsible::Worker,
        }
    }

    fn request(id: u64, chat_id: i64, page: u32) -> HistoryRequest {
        HistoryRequest {
            id,
            chat_id,
            page,
            per_page: 20,
        }
    }

    #[test]
    fn default_session_is_empty() {
        let session = SessionContext::default();

        assert!(!session.is_open());
        assert!(!session.is_loading());
        assert_eq!(session.ui_state(), OpenChatUiState::Empty);
        assert_eq!(session.cursor(), PaginationCursor::default());
    }

    #[test]
    fn open_resets_cursor_and_sequence() {
        let mut session = SessionContext::default();
        session.open(chat(1), request(1, 1, 1));
        session.apply_page(MessageSequence::empty(1), 3, true);

        session.open(chat(2), request(2, 2, 1));

        assert_eq!(session.active_chat_id(), Some(2));
        assert_eq!(session.cursor().page, 1);
        assert!(!session.cursor().has_more_pages);
        assert_eq!(session.sequence().map(MessageSequence::chat_id), Some(2));
        assert_eq!(session.ui_state(), OpenChatUiState::Loading);
    }

    #[test]
    fn accepts_only_current_request_of_active_chat() {
        let mut session = SessionContext::default();
        session.open(chat(1), request(1, 1, 1));

        assert!(session.accepts(&request(1, 1, 1)));
        assert!(!session.accepts(&request(9, 1, 1)));

        session.open(chat(2), request(2, 2, 1));
        assert!(!session.accepts(&request(1, 1, 1)));
    }

    #[test]
    fn failed_first_page_shows_error_but_keeps_cursor() {
        let mut session = SessionContext::default();
        session.open(chat(1), request(1, 1, 1));

        session.fail_fetch();

        assert_eq!(session.ui_state(), OpenChatUiState::Error);
        assert!(!session.is_loading());
        assert_eq!(session.cursor().page, 1);
    }

    #[test]
    fn replace_sequence_ignores_other_chats() {
        let mut session = SessionContext::default();
        session.open(chat(1), request(1, 1, 1));

        session.replace_sequence(MessageSequence::empty(2));

        assert_eq!(session.sequence().map(MessageSequence::chat_id), Some(1));
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut session = SessionContext::default();
        session.open(chat(1), request(1, 1, 1));

        session.clear();

        assert_eq!(session, SessionContext::default());
    }
}
