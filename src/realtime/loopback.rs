//! In-process transport used by the replay command and tests.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use super::{
    auth::ChannelCredentials,
    router::{ConnectionSignal, EventRouter, RouteOutcome},
    topic::Topic,
    transport::{ChannelTransport, TransportFailure},
};

pub const OP_CONNECT: &str = "connect";
pub const OP_SUBSCRIBE: &str = "subscribe";
pub const OP_BIND: &str = "bind";
pub const OP_UNBIND: &str = "unbind";
pub const OP_UNSUBSCRIBE: &str = "unsubscribe";
pub const OP_DISCONNECT: &str = "disconnect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Subscribe { topic: Topic, bearer: String },
    Bind(Topic),
    Unbind(Topic),
    Unsubscribe(Topic),
    Disconnect,
}

#[derive(Debug, Default)]
struct LoopbackState {
    router: Option<EventRouter>,
    bound: BTreeSet<Topic>,
    calls: Vec<TransportCall>,
    failures: HashMap<&'static str, u32>,
}

impl LoopbackState {
    fn take_failure(&mut self, operation: &'static str) -> Result<(), TransportFailure> {
        match self.failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(TransportFailure::new(operation, "injected failure"))
            }
            _ => Ok(()),
        }
    }
}

/// Transport that keeps everything in memory. Frames are injected through the
/// paired [`LoopbackHandle`].
#[derive(Debug)]
pub struct LoopbackTransport {
    inner: Arc<Mutex<LoopbackState>>,
}

#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    inner: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    pub fn new() -> (Self, LoopbackHandle) {
        let inner = Arc::new(Mutex::new(LoopbackState::default()));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            LoopbackHandle { inner },
        )
    }

    fn record(
        &mut self,
        operation: &'static str,
        call: TransportCall,
        apply: impl FnOnce(&mut LoopbackState),
    ) -> Result<(), TransportFailure> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| TransportFailure::new(operation, "loopback state poisoned"))?;
        state.calls.push(call);
        state.take_failure(operation)?;
        apply(&mut *state);
        Ok(())
    }
}

impl ChannelTransport for LoopbackTransport {
    fn connect(&mut self, router: EventRouter) -> Result<(), TransportFailure> {
        self.record(OP_CONNECT, TransportCall::Connect, |state| {
            state.router = Some(router);
        })
    }

    fn subscribe(
        &mut self,
        topic: &Topic,
        credentials: &ChannelCredentials,
    ) -> Result<(), TransportFailure> {
        let call = TransportCall::Subscribe {
            topic: topic.clone(),
            bearer: credentials.token().to_owned(),
        };
        self.record(OP_SUBSCRIBE, call, |_| {})
    }

    fn bind(&mut self, topic: &Topic) -> Result<(), TransportFailure> {
        self.record(OP_BIND, TransportCall::Bind(topic.clone()), |state| {
            state.bound.insert(topic.clone());
        })
    }

    fn unbind(&mut self, topic: &Topic) -> Result<(), TransportFailure> {
        self.record(OP_UNBIND, TransportCall::Unbind(topic.clone()), |state| {
            state.bound.remove(topic);
        })
    }

    fn unsubscribe(&mut self, topic: &Topic) -> Result<(), TransportFailure> {
        self.record(
            OP_UNSUBSCRIBE,
            TransportCall::Unsubscribe(topic.clone()),
            |state| {
                state.bound.remove(topic);
            },
        )
    }

    fn disconnect(&mut self) -> Result<(), TransportFailure> {
        self.record(OP_DISCONNECT, TransportCall::Disconnect, |state| {
            state.bound.clear();
            state.router = None;
        })
    }
}

impl LoopbackHandle {
    /// Delivers a raw frame as if the service pushed it on `topic`. Frames for
    /// topics that are not bound are dropped.
    pub fn push(&self, topic: &Topic, frame: &str) -> RouteOutcome {
        let router = match self.inner.lock() {
            Ok(state) if state.bound.contains(topic) => state.router.clone(),
            _ => None,
        };

        match router {
            Some(router) => router.route(topic.as_str(), frame),
            None => RouteOutcome::Unrouted,
        }
    }

    /// Makes the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        if let Ok(mut state) = self.inner.lock() {
            state.failures.insert(operation, times);
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn bound_topics(&self) -> Vec<Topic> {
        self.inner
            .lock()
            .map(|state| state.bound.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The service dropped the socket and the client re-established it.
    /// Server-side bindings are gone until the bridge re-binds.
    pub fn simulate_reconnect(&self) {
        self.raise(ConnectionSignal::Reconnected);
    }

    pub fn simulate_connection_lost(&self) {
        self.raise(ConnectionSignal::Lost);
    }

    fn raise(&self, signal: ConnectionSignal) {
        if let Ok(mut state) = self.inner.lock() {
            state.bound.clear();
            if let Some(router) = state.router.as_ref() {
                router.signal(signal);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str =
        r#"{"event": "message.status", "data": {"chatId": 1, "id": 7, "status": "failed"}}"#;

    #[test]
    fn pushes_reach_router_only_while_bound() {
        let (mut transport, handle) = LoopbackTransport::new();
        let router = EventRouter::new();
        let topic = Topic::chat(1);
        let mut stream = router.register(&topic);
        transport.connect(router).expect("connect");

        assert_eq!(handle.push(&topic, FRAME), RouteOutcome::Unrouted);

        transport.bind(&topic).expect("bind");
        assert_eq!(handle.push(&topic, FRAME), RouteOutcome::Delivered);

        transport.unbind(&topic).expect("unbind");
        assert_eq!(handle.push(&topic, FRAME), RouteOutcome::Unrouted);

        assert_eq!(stream.drain().len(), 1);
    }

    #[test]
    fn injected_failures_are_consumed() {
        let (mut transport, handle) = LoopbackTransport::new();
        let topic = Topic::chat(1);
        handle.fail_next(OP_BIND, 1);

        assert!(transport.bind(&topic).is_err());
        assert!(transport.bind(&topic).is_ok());
        assert_eq!(
            handle.calls(),
            vec![TransportCall::Bind(topic.clone()), TransportCall::Bind(topic)]
        );
    }

    #[test]
    fn reconnect_drops_server_side_bindings() {
        let (mut transport, handle) = LoopbackTransport::new();
        let router = EventRouter::new();
        transport.connect(router.clone()).expect("connect");
        transport.bind(&Topic::chat(1)).expect("bind");

        handle.simulate_reconnect();

        assert!(handle.bound_topics().is_empty());
        assert_eq!(router.take_signals(), vec![ConnectionSignal::Reconnected]);
    }
}
