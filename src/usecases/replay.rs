//! Offline replay of a recorded session.
//!
//! A transcript is JSON lines, one step per line, tagged by `op`. Collaborator
//! answers (history pages, send results, chat-list pages) are part of the
//! transcript and are handed back in request order, so every interleaving of
//! pushes and responses can be reproduced.

use std::{
    collections::VecDeque,
    fs,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        chat::{ChatResponsible, ChatSummary},
        date_label::Clock,
        message::Message,
        open_chat_state::HistoryRequest,
    },
    infra::{config::AppConfig, error::AppError},
    realtime::{
        auth::SessionTokenAuthorizer,
        bridge::RealtimeChannelBridge,
        loopback::{LoopbackHandle, LoopbackTransport},
        topic::Topic,
    },
    usecases::{
        chat_session::{ChatSessionStore, PendingSend, SessionSnapshot},
        contracts::{Dispatcher, SessionEvent},
        list_chats::{ChatListFilter, ChatListPage, ChatListSource, ChatListSourceError},
        load_messages::{self, MessagesPage, MessagesSourceError},
        notifications::{DedupingNotifier, Notification, RecordingNotifier},
        send_message::{self, SendMessageCommand, SendMessageSourceError},
        session_driver::SessionDriver,
    },
};

const REPLAY_UNANSWERED: &str = "REPLAY_NOTHING_TO_ANSWER";
const REPLAY_TOKEN: &str = "replay-session";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TranscriptStep {
    /// Pins "now" for date labels and optimistic timestamps (RFC 3339).
    Clock { now: String },
    ConnectInbox { user_id: i64 },
    ChatList {
        tab: ChatResponsible,
        #[serde(default)]
        chats: Vec<ChatSummary>,
        #[serde(default)]
        has_more_pages: bool,
        #[serde(default = "default_true")]
        replace: bool,
        #[serde(default)]
        error: Option<ChatListSourceError>,
    },
    OpenChat { chat: ChatSummary },
    /// Answers the oldest unanswered history request.
    History {
        #[serde(default)]
        items: Vec<Message>,
        #[serde(default)]
        has_more_pages: bool,
        #[serde(default)]
        error: Option<MessagesSourceError>,
    },
    LoadOlder,
    Push {
        topic: String,
        frame: serde_json::Value,
    },
    Send {
        chat_id: i64,
        text: String,
        #[serde(default)]
        reply_message_id: Option<i64>,
    },
    /// Answers the oldest unanswered send.
    SendResult {
        #[serde(default)]
        message: Option<Message>,
        #[serde(default)]
        error: Option<SendMessageSourceError>,
    },
    SwitchTab { tab: ChatResponsible },
    Reconnect,
    ConnectionLost,
    Logout,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub session: SessionSnapshot,
    pub connectivity: &'static str,
    pub bound_topics: Vec<String>,
    pub pending_history: usize,
    pub pending_sends: usize,
    pub notifications: Vec<Notification>,
}

/// Parses a transcript. Blank lines and lines starting with `#` are skipped.
pub fn parse_transcript(raw: &str) -> Result<Vec<TranscriptStep>, AppError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| AppError::TranscriptParse {
                line: index + 1,
                source,
            })
        })
        .collect()
}

pub fn replay_file(config: &AppConfig, path: &Path) -> Result<ReplayReport, AppError> {
    let raw = fs::read_to_string(path).map_err(|source| AppError::TranscriptRead {
        path: path.to_path_buf(),
        source,
    })?;
    let steps = parse_transcript(&raw)?;

    Ok(replay(config, steps)?)
}

pub fn replay(config: &AppConfig, steps: Vec<TranscriptStep>) -> Result<ReplayReport> {
    let mut session = ReplaySession::new(config);
    for step in steps {
        session.apply(step)?;
    }

    Ok(session.report())
}

#[derive(Debug, Default)]
struct ScriptedDispatcher {
    history: VecDeque<HistoryRequest>,
    sends: VecDeque<PendingSend>,
}

impl Dispatcher for ScriptedDispatcher {
    fn dispatch_history(&mut self, request: HistoryRequest) {
        self.history.push_back(request);
    }

    fn dispatch_send(&mut self, pending: PendingSend) {
        self.sends.push_back(pending);
    }
}

/// Clock that the transcript can move.
#[derive(Debug)]
struct ReplayClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ReplayClock {
    fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut current) = self.now.lock() {
            *current = now;
        }
    }
}

impl Clock for ReplayClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| Local::now().fixed_offset())
    }
}

struct StaticChatList(Result<ChatListPage, ChatListSourceError>);

impl ChatListSource for StaticChatList {
    fn list_chats(&self, _filter: &ChatListFilter) -> Result<ChatListPage, ChatListSourceError> {
        self.0.clone()
    }
}

type ReplayDriver = SessionDriver<ScriptedDispatcher, DedupingNotifier<RecordingNotifier>>;

struct ReplaySession {
    driver: ReplayDriver,
    channel: LoopbackHandle,
    clock: Arc<ReplayClock>,
}

impl ReplaySession {
    fn new(config: &AppConfig) -> Self {
        let clock = Arc::new(ReplayClock {
            now: Mutex::new(Local::now().fixed_offset()),
        });
        let store_clock: Arc<dyn Clock> = clock.clone();
        let store = ChatSessionStore::new(store_clock, config.store_settings());

        let (transport, channel) = LoopbackTransport::new();
        let bridge = RealtimeChannelBridge::new(
            Box::new(transport),
            Box::new(SessionTokenAuthorizer::new(Some(REPLAY_TOKEN.to_owned()))),
            config.channel.subscribe_attempts,
        );

        let notifier = DedupingNotifier::new(
            RecordingNotifier::default(),
            Duration::from_millis(config.notifications.dedupe_window_ms),
        );

        Self {
            driver: SessionDriver::new(store, bridge, ScriptedDispatcher::default(), notifier),
            channel,
            clock,
        }
    }

    fn apply(&mut self, step: TranscriptStep) -> Result<()> {
        tracing::debug!(step = ?step, "replaying step");

        match step {
            TranscriptStep::Clock { now } => {
                self.clock.set(DateTime::parse_from_rfc3339(&now)?);
            }
            TranscriptStep::ConnectInbox { user_id } => {
                // Failures are already surfaced as notifications.
                let _ = self.driver.connect_inbox(user_id);
            }
            TranscriptStep::ChatList {
                tab,
                chats,
                has_more_pages,
                replace,
                error,
            } => {
                let source = StaticChatList(match error {
                    Some(error) => Err(error),
                    None => Ok(ChatListPage {
                        items: chats,
                        has_more_pages,
                    }),
                });
                if replace {
                    self.driver
                        .load_chat_list(&source, ChatListFilter::for_tab(tab), true);
                } else {
                    self.driver.load_next_chat_page(&source);
                }
            }
            TranscriptStep::OpenChat { chat } => {
                self.driver.handle_event(SessionEvent::OpenChat(chat))?;
            }
            TranscriptStep::History {
                items,
                has_more_pages,
                error,
            } => {
                let Some(request) = self.driver.dispatcher_mut().history.pop_front() else {
                    tracing::warn!(code = REPLAY_UNANSWERED, "history answer without a request");
                    return Ok(());
                };
                let result = match error {
                    Some(error) => Err(load_messages::map_source_error(error)),
                    None => Ok(MessagesPage {
                        items,
                        has_more_pages,
                    }),
                };
                self.driver
                    .handle_event(SessionEvent::HistoryLoaded { request, result })?;
            }
            TranscriptStep::LoadOlder => {
                self.driver.handle_event(SessionEvent::LoadOlderMessages)?;
            }
            TranscriptStep::Push { topic, frame } => {
                let outcome = self.channel.push(&Topic::new(topic), &frame.to_string());
                tracing::debug!(outcome = ?outcome, "frame pushed");
                self.driver.pump_channel();
            }
            TranscriptStep::Send {
                chat_id,
                text,
                reply_message_id,
            } => {
                let command = SendMessageCommand {
                    chat_id,
                    text,
                    reply_message_id,
                };
                self.driver.handle_event(SessionEvent::SendMessage(command))?;
            }
            TranscriptStep::SendResult { message, error } => {
                let Some(pending) = self.driver.dispatcher_mut().sends.pop_front() else {
                    tracing::warn!(code = REPLAY_UNANSWERED, "send answer without a send");
                    return Ok(());
                };
                let result = match (message, error) {
                    (_, Some(error)) => Err(send_message::map_source_error(error)),
                    (Some(message), None) => Ok(message),
                    (None, None) => Err(send_message::map_source_error(
                        SendMessageSourceError::Unavailable,
                    )),
                };
                self.driver
                    .handle_event(SessionEvent::SendCompleted { pending, result })?;
            }
            TranscriptStep::SwitchTab { tab } => {
                self.driver.handle_event(SessionEvent::SwitchTab(tab))?;
            }
            TranscriptStep::Reconnect => {
                self.channel.simulate_reconnect();
                self.driver.pump_channel();
            }
            TranscriptStep::ConnectionLost => {
                self.channel.simulate_connection_lost();
                self.driver.pump_channel();
            }
            TranscriptStep::Logout => {
                self.driver.handle_event(SessionEvent::Logout)?;
            }
        }

        Ok(())
    }

    fn report(mut self) -> ReplayReport {
        let pending_history = self.driver.dispatcher_mut().history.len();
        let pending_sends = self.driver.dispatcher_mut().sends.len();
        let bridge = self.driver.bridge();

        ReplayReport {
            session: self.driver.store().snapshot(),
            connectivity: bridge.status().snapshot().connectivity.as_label(),
            bound_topics: bridge
                .bound_topics()
                .iter()
                .map(|topic| topic.as_str().to_owned())
                .collect(),
            pending_history,
            pending_sends,
            notifications: self.driver.notifier().inner().delivered().to_vec(),
        }
    }
}
