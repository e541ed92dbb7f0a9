//! Fan-out of decoded channel frames to per-topic event streams.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::domain::events::ChannelEvent;

use super::{topic::Topic, wire};

const ROUTER_MALFORMED_FRAME: &str = "CHANNEL_MALFORMED_FRAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// Protocol housekeeping or an event kind this client does not handle.
    Ignored,
    /// Nobody is listening on the topic (anymore).
    Unrouted,
    Malformed,
}

/// Connection-level signals raised by the transport outside of any topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    Reconnected,
    Lost,
}

#[derive(Clone, Debug, Default)]
pub struct EventRouter {
    inner: Arc<Mutex<RouterState>>,
}

#[derive(Debug, Default)]
struct RouterState {
    routes: HashMap<Topic, UnboundedSender<ChannelEvent>>,
    signals: Vec<ConnectionSignal>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh stream for `topic`. A stream registered earlier for the
    /// same topic is closed.
    pub fn register(&self, topic: &Topic) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut state) = self.inner.lock() {
            state.routes.insert(topic.clone(), tx);
        }
        EventStream {
            topic: topic.clone(),
            rx,
            closed: false,
        }
    }

    pub fn remove(&self, topic: &Topic) {
        if let Ok(mut state) = self.inner.lock() {
            state.routes.remove(topic);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.routes.clear();
            state.signals.clear();
        }
    }

    pub fn is_routed(&self, topic: &Topic) -> bool {
        self.inner
            .lock()
            .map(|state| state.routes.contains_key(topic))
            .unwrap_or(false)
    }

    pub fn route(&self, topic: &str, frame: &str) -> RouteOutcome {
        let event = match wire::decode_frame(frame) {
            Ok(Some(event)) => event,
            Ok(None) => return RouteOutcome::Ignored,
            Err(error) => {
                tracing::warn!(
                    code = ROUTER_MALFORMED_FRAME,
                    topic,
                    error = %error,
                    "dropping malformed channel frame"
                );
                return RouteOutcome::Malformed;
            }
        };

        let Ok(mut state) = self.inner.lock() else {
            return RouteOutcome::Unrouted;
        };

        let key = Topic::new(topic);
        let delivered = state
            .routes
            .get(&key)
            .is_some_and(|tx| tx.send(event).is_ok());

        if delivered {
            RouteOutcome::Delivered
        } else {
            state.routes.remove(&key);
            tracing::debug!(topic, "channel frame has no listener");
            RouteOutcome::Unrouted
        }
    }

    pub fn signal(&self, signal: ConnectionSignal) {
        if let Ok(mut state) = self.inner.lock() {
            state.signals.push(signal);
        }
    }

    pub fn take_signals(&self) -> Vec<ConnectionSignal> {
        self.inner
            .lock()
            .map(|mut state| std::mem::take(&mut state.signals))
            .unwrap_or_default()
    }
}

/// Events for one bound topic, in arrival order.
#[derive(Debug)]
pub struct EventStream {
    topic: Topic,
    rx: UnboundedReceiver<ChannelEvent>,
    closed: bool,
}

impl EventStream {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Ended streams stay ended: re-subscribing hands out a new stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn try_next(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    pub async fn next(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        let event = self.rx.recv().await;
        if event.is_none() {
            self.closed = true;
        }
        event
    }

    pub fn drain(&mut self) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
