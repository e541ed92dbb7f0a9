//! Event loop that owns the store and the channel bridge.

use anyhow::Result;

use crate::{
    domain::{chat::ChatSummary, chat_tabs::ChatListUiState},
    realtime::{
        bridge::{RealtimeChannelBridge, SubscriptionError},
        router::EventStream,
        topic::Topic,
    },
    usecases::{
        chat_session::{ChatSessionStore, SessionError},
        contracts::{Dispatcher, SessionEvent, SessionEventSource},
        list_chats::{ChatListFilter, ChatListSource},
        logout::{logout_and_reset, LogoutOutcome},
        notifications::{Notification, Notifier},
    },
};

const SESSION_DRIVER_NOTIFIED: &str = "SESSION_DRIVER_NOTIFIED";

pub struct SessionDriver<D, N>
where
    D: Dispatcher,
    N: Notifier,
{
    store: ChatSessionStore,
    bridge: RealtimeChannelBridge,
    dispatcher: D,
    notifier: N,
    inbox: Option<Topic>,
    chat_topic: Option<Topic>,
    streams: Vec<EventStream>,
    running: bool,
}

impl<D, N> SessionDriver<D, N>
where
    D: Dispatcher,
    N: Notifier,
{
    pub fn new(
        store: ChatSessionStore,
        bridge: RealtimeChannelBridge,
        dispatcher: D,
        notifier: N,
    ) -> Self {
        Self {
            store,
            bridge,
            dispatcher,
            notifier,
            inbox: None,
            chat_topic: None,
            streams: Vec::new(),
            running: true,
        }
    }

    pub fn store(&self) -> &ChatSessionStore {
        &self.store
    }

    pub fn bridge(&self) -> &RealtimeChannelBridge {
        &self.bridge
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Subscribes the operator's inbox topic, which carries activity for
    /// every chat in the lists.
    pub fn connect_inbox(&mut self, user_id: i64) -> Result<(), SubscriptionError> {
        let topic = Topic::inbox(user_id);
        match self.bridge.subscribe(&topic) {
            Ok(stream) => {
                self.replace_stream(stream);
                self.inbox = Some(topic);
                Ok(())
            }
            Err(error) => {
                self.notify(&SessionError::Subscription(error.clone()));
                Err(error)
            }
        }
    }

    pub fn load_chat_list(
        &mut self,
        source: &dyn ChatListSource,
        filter: ChatListFilter,
        is_replace: bool,
    ) {
        if let Err(error) = self.store.load_chat_list(source, filter, is_replace) {
            self.notify(&error);
        }
    }

    /// Loads the next page of the active tab once the current one is shown.
    pub fn load_next_chat_page(&mut self, source: &dyn ChatListSource) {
        let tab = self.store.tabs().active_tab();
        if self.store.tabs().ui_state(tab) == ChatListUiState::Loading {
            return;
        }
        if let Err(error) = self.store.load_next_chat_page(source) {
            self.notify(&error);
        }
    }

    pub fn run(&mut self, source: &mut dyn SessionEventSource) -> Result<()> {
        while self.running {
            match source.next_event()? {
                Some(event) => self.handle_event(event)?,
                None => break,
            }
        }

        Ok(())
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::OpenChat(chat) => self.open_chat(chat),
            SessionEvent::LoadOlderMessages => {
                if let Some(request) = self.store.load_next_page() {
                    self.dispatcher.dispatch_history(request);
                }
            }
            SessionEvent::SwitchTab(tab) => self.store.switch_tab(tab),
            SessionEvent::SendMessage(command) => match self.store.begin_send(command) {
                Ok(pending) => self.dispatcher.dispatch_send(pending),
                Err(error) => self.notify(&error),
            },
            SessionEvent::HistoryLoaded { request, result } => {
                if let Err(error) = self.store.complete_history(&request, result) {
                    self.notify(&error);
                }
            }
            SessionEvent::SendCompleted { pending, result } => {
                if let Err(error) = self.store.complete_send(&pending, result) {
                    self.notify(&error);
                }
            }
            SessionEvent::Channel(event) => self.store.on_channel_event(event),
            SessionEvent::Logout => {
                self.logout();
            }
            SessionEvent::Tick => {}
            SessionEvent::Quit => self.running = false,
        }

        self.pump_channel();
        Ok(())
    }

    /// Applies pushed events and connection changes that arrived since the
    /// last call.
    pub fn pump_channel(&mut self) {
        for stream in &mut self.streams {
            for event in stream.drain() {
                self.store.on_channel_event(event);
            }
        }

        let failures = self.bridge.poll_connection();
        let lost = failures
            .iter()
            .any(|error| matches!(error, SubscriptionError::ConnectionLost));
        for error in failures {
            self.notify(&SessionError::Subscription(error));
        }

        self.streams.retain(|stream| !stream.is_closed());

        if lost {
            self.recover_after_loss();
        }
    }

    pub fn logout(&mut self) -> LogoutOutcome {
        let outcome = logout_and_reset(&mut self.store, &mut self.bridge);
        self.streams.clear();
        self.inbox = None;
        self.chat_topic = None;
        outcome
    }

    fn open_chat(&mut self, chat: ChatSummary) {
        let topic = Topic::chat(chat.id);
        if self
            .chat_topic
            .as_ref()
            .is_some_and(|previous| *previous != topic)
        {
            if let Some(previous) = self.chat_topic.take() {
                self.bridge.unsubscribe(&previous);
            }
        }

        if let Some(inbox) = self.inbox.clone() {
            self.ensure_bound(&inbox);
        }
        self.chat_topic = Some(topic.clone());
        self.ensure_bound(&topic);

        let request = self.store.open_chat(chat);
        self.dispatcher.dispatch_history(request);
    }

    /// Re-subscribes what was bound before the connection dropped and
    /// re-fetches the open chat, since pushes may have been missed. Topics
    /// that fail stay wanted and are retried on the next chat open.
    fn recover_after_loss(&mut self) {
        let topics: Vec<Topic> = self
            .inbox
            .iter()
            .chain(self.chat_topic.iter())
            .cloned()
            .collect();

        for topic in topics {
            self.ensure_bound(&topic);
        }

        if let Some(request) = self.store.reload_active_chat() {
            self.dispatcher.dispatch_history(request);
        }
    }

    /// Subscribes `topic` unless the bridge already has it bound.
    fn ensure_bound(&mut self, topic: &Topic) {
        if self.bridge.is_bound(topic) {
            return;
        }

        match self.bridge.subscribe(topic) {
            Ok(stream) => self.replace_stream(stream),
            Err(error) => self.notify(&SessionError::Subscription(error)),
        }
    }

    fn replace_stream(&mut self, stream: EventStream) {
        self.streams.retain(|existing| existing.topic() != stream.topic());
        self.streams.push(stream);
    }

    fn notify(&mut self, error: &SessionError) {
        tracing::debug!(code = SESSION_DRIVER_NOTIFIED, error_code = error.code(), "surfacing error");
        self.notifier.notify(Notification::error(error.to_string()));
    }
}
