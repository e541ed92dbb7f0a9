//! State of the open chat and of the two chat-list tabs.
//!
//! The store is the single writer for everything the UI shows. History is
//! loaded split-phase: the store hands out a [`HistoryRequest`] and later gets
//! the response back through [`ChatSessionStore::complete_history`], so live
//! pushes and page merges apply in whatever order they arrive. Each merge
//! checks the response still targets the open chat.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    domain::{
        chat::{ChatResponsible, ChatSummary},
        chat_tabs::{ChatTabs, PromoteOutcome, UnknownChatPolicy},
        date_label::{Clock, LOCAL_TIMESTAMP_FORMAT},
        events::ChannelEvent,
        message::{
            DisplayMessage, Message, MessageDirection, MessageId, MessageStatus, MessageType,
            ReplyReference, SenderRole,
        },
        open_chat_state::{HistoryRequest, OpenChatUiState, PaginationCursor, SessionContext},
        reconciler::{self, MessageSequence},
    },
    realtime::bridge::{RealtimeChannelBridge, SubscriptionError},
    usecases::{
        list_chats::{
            list_chats, ChatListFilter, ChatListSource, ListChatsError, DEFAULT_CHAT_PAGE_SIZE,
        },
        load_messages::{LoadMessagesError, MessagesPage, DEFAULT_HISTORY_PAGE_SIZE},
        send_message::{self, SendMessageCommand, SendMessageError},
    },
};

const SESSION_STALE_HISTORY: &str = "SESSION_STALE_HISTORY";
const SESSION_HISTORY_FAILED: &str = "SESSION_HISTORY_FAILED";
const SESSION_SEND_FAILED: &str = "SESSION_SEND_FAILED";
const SESSION_CHAT_LIST_FAILED: &str = "SESSION_CHAT_LIST_FAILED";

const TEMPORARY_ID_PREFIX: &str = "tmp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub history_per_page: u32,
    pub chat_list_per_page: u32,
    pub unknown_chat_policy: UnknownChatPolicy,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            history_per_page: DEFAULT_HISTORY_PAGE_SIZE,
            chat_list_per_page: DEFAULT_CHAT_PAGE_SIZE,
            unknown_chat_policy: UnknownChatPolicy::Ignore,
        }
    }
}

/// A collaborator call that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("loading messages failed: {0}")]
    History(#[from] LoadMessagesError),
    #[error("sending the message failed: {0}")]
    Send(#[from] SendMessageError),
    #[error("loading chats failed: {0}")]
    ChatList(#[from] ListChatsError),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::History(error) => error.code(),
            Self::Send(error) => error.code(),
            Self::ChatList(error) => error.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(error) => error.code(),
            Self::Subscription(error) => error.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Merged { page: u32, total: usize },
    /// The response no longer matches the open chat or the awaited request.
    Discarded,
}

/// An optimistic send waiting for the backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub temporary_id: String,
    pub command: SendMessageCommand,
}

/// Read-only view of the store, as rendered or printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub active_tab: ChatResponsible,
    pub active_chat: Option<ChatSummary>,
    pub ui_state: OpenChatUiState,
    pub cursor: PaginationCursor,
    pub loading: bool,
    pub messages: Vec<DisplayMessage>,
    pub ai_chats: Vec<ChatSummary>,
    pub worker_chats: Vec<ChatSummary>,
}

pub struct ChatSessionStore {
    session: SessionContext,
    tabs: ChatTabs,
    list_filters: HashMap<ChatResponsible, ChatListFilter>,
    clock: Arc<dyn Clock>,
    settings: StoreSettings,
    next_request_id: u64,
    next_temporary_id: u64,
    revision: watch::Sender<u64>,
}

impl ChatSessionStore {
    pub fn new(clock: Arc<dyn Clock>, settings: StoreSettings) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            session: SessionContext::default(),
            tabs: ChatTabs::default(),
            list_filters: HashMap::new(),
            clock,
            settings,
            next_request_id: 0,
            next_temporary_id: 0,
            revision,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn tabs(&self) -> &ChatTabs {
        &self.tabs
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    pub fn active_chat_id(&self) -> Option<i64> {
        self.session.active_chat_id()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        self.session
            .sequence()
            .map(MessageSequence::entries)
            .unwrap_or(&[])
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.session.cursor()
    }

    /// Receives the store revision, bumped after every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_tab: self.tabs.active_tab(),
            active_chat: self.session.active_chat().cloned(),
            ui_state: self.session.ui_state(),
            cursor: self.session.cursor(),
            loading: self.session.is_loading(),
            messages: self.messages().to_vec(),
            ai_chats: self.tabs.chats(ChatResponsible::Ai).to_vec(),
            worker_chats: self.tabs.chats(ChatResponsible::Worker).to_vec(),
        }
    }

    /// Makes `chat` the open chat and asks for its first page.
    pub fn open_chat(&mut self, chat: ChatSummary) -> HistoryRequest {
        let request = self.issue(chat.id, 1);
        tracing::info!(chat_id = chat.id, request_id = request.id, "opening chat");

        self.tabs.mark_read(chat.id);
        self.session.open(chat, request.clone());
        self.publish();
        request
    }

    /// Asks for the next older page, unless there is none or one is in flight.
    pub fn load_next_page(&mut self) -> Option<HistoryRequest> {
        let chat_id = self.session.active_chat_id()?;
        if self.session.is_loading() {
            tracing::debug!(chat_id, "history page already in flight");
            return None;
        }

        let cursor = self.session.cursor();
        if !cursor.has_more_pages {
            return None;
        }

        let request = self.issue(chat_id, cursor.page + 1);
        self.session.begin_fetch(request.clone());
        self.publish();
        Some(request)
    }

    /// Re-fetches page 1 of the open chat without dropping what is shown.
    pub fn reload_active_chat(&mut self) -> Option<HistoryRequest> {
        let chat_id = self.session.active_chat_id()?;
        let request = self.issue(chat_id, 1);
        self.session.begin_fetch(request.clone());
        self.publish();
        Some(request)
    }

    pub fn complete_history(
        &mut self,
        request: &HistoryRequest,
        result: Result<MessagesPage, LoadMessagesError>,
    ) -> Result<HistoryOutcome, SessionError> {
        if !self.session.accepts(request) {
            tracing::debug!(
                code = SESSION_STALE_HISTORY,
                chat_id = request.chat_id,
                request_id = request.id,
                page = request.page,
                "discarding history response for a superseded request"
            );
            return Ok(HistoryOutcome::Discarded);
        }

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!(
                    code = SESSION_HISTORY_FAILED,
                    chat_id = request.chat_id,
                    page = request.page,
                    error = %error,
                    "history fetch failed"
                );
                self.session.fail_fetch();
                self.publish();
                return Err(TransportError::History(error).into());
            }
        };

        let current = self
            .session
            .sequence()
            .cloned()
            .unwrap_or_else(|| MessageSequence::empty(request.chat_id));
        let merged = reconciler::merge_history_page(
            &current,
            page.items,
            request.page,
            self.clock.as_ref(),
        );
        let total = merged.len();

        self.session
            .apply_page(merged, request.page, page.has_more_pages);
        self.publish();

        Ok(HistoryOutcome::Merged {
            page: request.page,
            total,
        })
    }

    /// Folds a pushed message into the open chat and bumps its chat row.
    pub fn on_live_message(&mut self, message: Message, chat: Option<ChatSummary>) {
        let chat_id = message.chat_id;
        let is_active = self.session.active_chat_id() == Some(chat_id);

        if is_active {
            self.merge_into_open_chat(message.clone());
        }

        let listed = self.tabs.find(chat_id).map(|(_, row)| row.clone());
        let row = match (chat, listed) {
            (Some(mut incoming), Some(listed)) => {
                incoming.unread_count = listed.unread_count;
                Some(incoming)
            }
            (incoming, listed) => incoming.or(listed),
        };

        if let Some(mut row) = row {
            row.record_activity(&message);
            if is_active {
                self.session.set_active_responsible(row.responsible);
            }
            let outcome = self.tabs.promote(row, self.settings.unknown_chat_policy);
            if !is_active && outcome != PromoteOutcome::NotListed {
                self.tabs.increment_unread(chat_id);
            }
        } else {
            tracing::debug!(chat_id, "live message for a chat listed in neither tab");
        }

        self.publish();
    }

    pub fn on_message_status(&mut self, chat_id: i64, id: &MessageId, status: MessageStatus) {
        let Some(current) = self.open_sequence_for(chat_id) else {
            return;
        };

        let next = reconciler::update_status(&current, id, status, self.clock.as_ref());
        self.session.replace_sequence(next);
        self.publish();
    }

    pub fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::MessageCreated { message, chat } => self.on_live_message(message, chat),
            ChannelEvent::MessageUpdated { message } => {
                if self.session.active_chat_id() == Some(message.chat_id) {
                    self.merge_into_open_chat(message);
                    self.publish();
                }
            }
            ChannelEvent::MessageStatusChanged {
                chat_id,
                message_id,
                status,
            } => self.on_message_status(chat_id, &message_id, status),
            ChannelEvent::ChatReassigned { chat } => {
                if self.session.active_chat_id() == Some(chat.id) {
                    self.session.set_active_responsible(chat.responsible);
                }
                self.promote_chat_to_top(chat);
            }
        }
    }

    /// Moves `chat` to the front of the tab it is assigned to.
    pub fn promote_chat_to_top(&mut self, chat: ChatSummary) -> PromoteOutcome {
        let outcome = self.tabs.promote(chat, self.settings.unknown_chat_policy);
        self.publish();
        outcome
    }

    pub fn switch_tab(&mut self, tab: ChatResponsible) {
        self.tabs.set_active_tab(tab);
        self.publish();
    }

    /// Loads one page of the tab named by `filter.responsible`. A replace
    /// starts over at page 1; otherwise the page is appended.
    pub fn load_chat_list(
        &mut self,
        source: &dyn ChatListSource,
        mut filter: ChatListFilter,
        is_replace: bool,
    ) -> Result<(), SessionError> {
        let tab = filter.responsible;
        if filter.per_page == 0 {
            filter.per_page = self.settings.chat_list_per_page;
        }
        if is_replace {
            filter.page = 1;
        }

        self.tabs.set_loading(tab);
        let result = list_chats(source, &filter);
        self.list_filters.insert(tab, filter.clone());

        match result {
            Ok(page) if is_replace => self.tabs.replace(tab, page.items, page.has_more_pages),
            Ok(page) => self
                .tabs
                .append(tab, filter.page, page.items, page.has_more_pages),
            Err(error) => {
                tracing::warn!(
                    code = SESSION_CHAT_LIST_FAILED,
                    tab = tab.as_label(),
                    page = filter.page,
                    error = %error,
                    "chat list fetch failed"
                );
                self.tabs.set_error(tab);
                self.publish();
                return Err(TransportError::ChatList(error).into());
            }
        }

        self.publish();
        Ok(())
    }

    /// Appends the next page of the active tab. Returns whether a page was
    /// requested.
    pub fn load_next_chat_page(
        &mut self,
        source: &dyn ChatListSource,
    ) -> Result<bool, SessionError> {
        let tab = self.tabs.active_tab();
        let cursor = self.tabs.cursor(tab);
        if !cursor.has_more_pages {
            return Ok(false);
        }

        let filter = ChatListFilter {
            page: cursor.page + 1,
            ..self
                .list_filters
                .get(&tab)
                .cloned()
                .unwrap_or_else(|| ChatListFilter::for_tab(tab))
        };
        self.load_chat_list(source, filter, false)?;
        Ok(true)
    }

    /// Drops the chat, and any row of the same lead, from `tab`.
    pub fn remove_chat(&mut self, chat_id: i64, lead_id: Option<i64>, tab: ChatResponsible) {
        self.tabs.remove(tab, chat_id, lead_id);
        self.publish();
    }

    /// Shows `command` in the open chat right away as a queued message.
    pub fn begin_send(&mut self, command: SendMessageCommand) -> Result<PendingSend, SessionError> {
        let command = send_message::validate(command).map_err(TransportError::Send)?;

        self.next_temporary_id += 1;
        let temporary_id = format!("{TEMPORARY_ID_PREFIX}{}", self.next_temporary_id);
        let message = self.optimistic_message(&temporary_id, &command);

        if self.session.active_chat_id() == Some(command.chat_id) {
            self.merge_into_open_chat(message.clone());
        }

        if let Some((_, listed)) = self.tabs.find(command.chat_id) {
            let mut row = listed.clone();
            row.record_activity(&message);
            self.tabs.promote(row, UnknownChatPolicy::Ignore);
        }

        tracing::debug!(chat_id = command.chat_id, temporary_id = %temporary_id, "message queued");
        self.publish();

        Ok(PendingSend {
            temporary_id,
            command,
        })
    }

    pub fn complete_send(
        &mut self,
        pending: &PendingSend,
        result: Result<Message, SendMessageError>,
    ) -> Result<(), SessionError> {
        let open = self.open_sequence_for(pending.command.chat_id);

        match result {
            Ok(confirmed) => {
                if let Some(current) = open {
                    let next = reconciler::replace_temporary_id(
                        &current,
                        &pending.temporary_id,
                        confirmed,
                        self.clock.as_ref(),
                    );
                    self.session.replace_sequence(next);
                    self.publish();
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    code = SESSION_SEND_FAILED,
                    chat_id = pending.command.chat_id,
                    temporary_id = %pending.temporary_id,
                    error = %error,
                    "message send failed"
                );
                if let Some(current) = open {
                    let next = reconciler::mark_send_failed(
                        &current,
                        &pending.temporary_id,
                        &error.to_string(),
                        self.clock.as_ref(),
                    );
                    self.session.replace_sequence(next);
                    self.publish();
                }
                Err(TransportError::Send(error).into())
            }
        }
    }

    /// Logout: releases the channel first, then forgets everything.
    pub fn clear(&mut self, bridge: &mut RealtimeChannelBridge) {
        bridge.disconnect();
        self.session.clear();
        self.tabs.clear();
        self.list_filters.clear();
        tracing::info!("chat session cleared");
        self.publish();
    }

    fn issue(&mut self, chat_id: i64, page: u32) -> HistoryRequest {
        self.next_request_id += 1;
        HistoryRequest {
            id: self.next_request_id,
            chat_id,
            page,
            per_page: self.settings.history_per_page,
        }
    }

    fn open_sequence_for(&self, chat_id: i64) -> Option<MessageSequence> {
        self.session
            .sequence()
            .filter(|sequence| sequence.chat_id() == chat_id)
            .cloned()
    }

    fn merge_into_open_chat(&mut self, message: Message) {
        if let Some(current) = self.open_sequence_for(message.chat_id) {
            let next = reconciler::merge_live_message(&current, message, self.clock.as_ref());
            self.session.replace_sequence(next);
        }
    }

    fn optimistic_message(&self, temporary_id: &str, command: &SendMessageCommand) -> Message {
        let reply_message = command.reply_message_id.map(|id| ReplyReference {
            id,
            preview: self
                .messages()
                .iter()
                .find(|entry| entry.id() == &MessageId::Confirmed(id))
                .map(|entry| entry.message.body.clone())
                .unwrap_or_default(),
        });

        Message {
            id: MessageId::Pending(temporary_id.to_owned()),
            chat_id: command.chat_id,
            body: command.text.clone(),
            direction: MessageDirection::Outbound,
            sender: SenderRole::Worker,
            status: Some(MessageStatus::Queued),
            created_at: self
                .clock
                .now()
                .naive_local()
                .format(LOCAL_TIMESTAMP_FORMAT)
                .to_string(),
            message_type: MessageType::Text,
            channel: None,
            attachments: Vec::new(),
            reply_message,
            error_message: None,
        }
    }

    fn publish(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
