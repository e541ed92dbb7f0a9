//! Subscription lifecycle for the real-time channel.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed -> Unsubscribing -> Disconnected
//! ```
//!
//! The bridge owns the transport and the list of bound topics. Each bound topic
//! has exactly one live [`EventStream`]; teardown is best-effort and never
//! fails.

use thiserror::Error;

use super::{
    auth::{AuthorizationError, ChannelAuthorizer},
    router::{ConnectionSignal, EventRouter, EventStream},
    status_tracker::ConnectionStatusTracker,
    topic::Topic,
    transport::{ChannelTransport, TransportFailure},
};

const CHANNEL_SUBSCRIBE_RETRY: &str = "CHANNEL_SUBSCRIBE_RETRY";
const CHANNEL_TEARDOWN_STEP_FAILED: &str = "CHANNEL_TEARDOWN_STEP_FAILED";
const CHANNEL_REBIND_FAILED: &str = "CHANNEL_REBIND_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Unsubscribing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("channel connection failed: {0}")]
    Connect(#[source] TransportFailure),
    #[error("authorization for {topic} failed after {attempts} attempt(s): {source}")]
    Authorization {
        topic: Topic,
        attempts: u32,
        #[source]
        source: AuthorizationError,
    },
    #[error("binding {topic} failed after {attempts} attempt(s): {source}")]
    Bind {
        topic: Topic,
        attempts: u32,
        #[source]
        source: TransportFailure,
    },
    #[error("channel is shutting down")]
    ShuttingDown,
    #[error("channel connection lost")]
    ConnectionLost,
}

impl SubscriptionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CHANNEL_CONNECT_FAILED",
            Self::Authorization { .. } => "CHANNEL_AUTH_FAILED",
            Self::Bind { .. } => "CHANNEL_BIND_FAILED",
            Self::ShuttingDown => "CHANNEL_SHUTTING_DOWN",
            Self::ConnectionLost => "CHANNEL_CONNECTION_LOST",
        }
    }
}

pub struct RealtimeChannelBridge {
    transport: Box<dyn ChannelTransport>,
    authorizer: Box<dyn ChannelAuthorizer>,
    router: EventRouter,
    state: BridgeState,
    bound: Vec<Topic>,
    subscribe_attempts: u32,
    status: ConnectionStatusTracker,
}

impl RealtimeChannelBridge {
    pub fn new(
        transport: Box<dyn ChannelTransport>,
        authorizer: Box<dyn ChannelAuthorizer>,
        subscribe_attempts: u32,
    ) -> Self {
        Self {
            transport,
            authorizer,
            router: EventRouter::new(),
            state: BridgeState::Disconnected,
            bound: Vec::new(),
            subscribe_attempts: subscribe_attempts.max(1),
            status: ConnectionStatusTracker::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn bound_topics(&self) -> &[Topic] {
        &self.bound
    }

    pub fn is_bound(&self, topic: &Topic) -> bool {
        self.bound.contains(topic)
    }

    pub fn status(&self) -> ConnectionStatusTracker {
        self.status.clone()
    }

    /// Binds `topic` and returns the stream of its events.
    ///
    /// Subscribing an already bound topic hands out a new stream and closes the
    /// previous one; the server-side binding is left alone.
    pub fn subscribe(&mut self, topic: &Topic) -> Result<EventStream, SubscriptionError> {
        if self.state == BridgeState::Unsubscribing {
            return Err(SubscriptionError::ShuttingDown);
        }

        self.ensure_connected()?;

        if self.is_bound(topic) {
            tracing::debug!(topic = %topic, "topic already bound, replacing event stream");
            return Ok(self.router.register(topic));
        }

        let stream = self.router.register(topic);
        match self.bind_with_retry(topic) {
            Ok(()) => {
                self.bound.push(topic.clone());
                self.set_state(BridgeState::Subscribed);
                tracing::info!(topic = %topic, "channel topic bound");
                Ok(stream)
            }
            Err(error) => {
                self.router.remove(topic);
                self.report(&error);
                Err(error)
            }
        }
    }

    /// Unbinds one topic and ends its stream. Failures are logged only.
    pub fn unsubscribe(&mut self, topic: &Topic) {
        self.router.remove(topic);
        if !self.is_bound(topic) {
            return;
        }

        self.release(topic);
        self.bound.retain(|bound| bound != topic);
        let next = if self.bound.is_empty() {
            BridgeState::Connected
        } else {
            BridgeState::Subscribed
        };
        self.set_state(next);
    }

    pub fn unsubscribe_all(&mut self) {
        if self.bound.is_empty() {
            return;
        }

        self.set_state(BridgeState::Unsubscribing);
        for topic in std::mem::take(&mut self.bound) {
            self.router.remove(&topic);
            self.release(&topic);
        }
        self.set_state(BridgeState::Connected);
    }

    /// Releases every topic, then closes the connection. Never fails.
    pub fn disconnect(&mut self) {
        if self.state == BridgeState::Disconnected {
            return;
        }

        self.unsubscribe_all();
        if let Err(error) = self.transport.disconnect() {
            tracing::warn!(
                code = CHANNEL_TEARDOWN_STEP_FAILED,
                error = %error,
                "channel disconnect failed, dropping connection"
            );
        }
        self.router.clear();
        self.set_state(BridgeState::Disconnected);
        tracing::info!("channel disconnected");
    }

    /// Re-binds every bound topic after the transport re-established its
    /// connection. Streams of topics that re-bind keep flowing; topics that
    /// cannot be re-bound are dropped and their streams end.
    pub fn on_transport_reconnected(&mut self) -> Vec<SubscriptionError> {
        if self.state == BridgeState::Disconnected {
            return Vec::new();
        }

        let mut failures = Vec::new();
        for topic in self.bound.clone() {
            if let Err(error) = self.bind_with_retry(&topic) {
                tracing::warn!(
                    code = CHANNEL_REBIND_FAILED,
                    topic = %topic,
                    error = %error,
                    "dropping topic that failed to re-bind"
                );
                self.router.remove(&topic);
                self.bound.retain(|bound| bound != &topic);
                self.report(&error);
                failures.push(error);
            }
        }

        let next = if self.bound.is_empty() {
            BridgeState::Connected
        } else {
            BridgeState::Subscribed
        };
        self.set_state(next);
        failures
    }

    /// Applies connection signals raised by the transport since the last poll.
    pub fn poll_connection(&mut self) -> Vec<SubscriptionError> {
        let mut failures = Vec::new();
        for signal in self.router.take_signals() {
            match signal {
                ConnectionSignal::Reconnected => {
                    tracing::info!(topics = self.bound.len(), "channel reconnected, re-binding");
                    failures.extend(self.on_transport_reconnected());
                }
                ConnectionSignal::Lost => {
                    tracing::warn!(
                        code = SubscriptionError::ConnectionLost.code(),
                        topics = self.bound.len(),
                        "channel connection lost"
                    );
                    self.bound.clear();
                    self.router.clear();
                    self.set_state(BridgeState::Disconnected);
                    let error = SubscriptionError::ConnectionLost;
                    self.report(&error);
                    failures.push(error);
                }
            }
        }
        failures
    }

    fn ensure_connected(&mut self) -> Result<(), SubscriptionError> {
        if self.state != BridgeState::Disconnected {
            return Ok(());
        }

        self.set_state(BridgeState::Connecting);
        match self.transport.connect(self.router.clone()) {
            Ok(()) => {
                self.set_state(BridgeState::Connected);
                Ok(())
            }
            Err(failure) => {
                self.set_state(BridgeState::Disconnected);
                let error = SubscriptionError::Connect(failure);
                self.report(&error);
                Err(error)
            }
        }
    }

    fn bind_with_retry(&mut self, topic: &Topic) -> Result<(), SubscriptionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_bind(topic, attempt) {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.subscribe_attempts => {
                    tracing::debug!(
                        code = CHANNEL_SUBSCRIBE_RETRY,
                        topic = %topic,
                        attempt,
                        error = %error,
                        "retrying channel subscription"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn try_bind(&mut self, topic: &Topic, attempts: u32) -> Result<(), SubscriptionError> {
        let credentials =
            self.authorizer
                .authorize(topic)
                .map_err(|source| SubscriptionError::Authorization {
                    topic: topic.clone(),
                    attempts,
                    source,
                })?;

        let bind_error = |source| SubscriptionError::Bind {
            topic: topic.clone(),
            attempts,
            source,
        };

        self.transport
            .subscribe(topic, &credentials)
            .map_err(bind_error)?;

        if let Err(failure) = self.transport.bind(topic) {
            if let Err(error) = self.transport.unsubscribe(topic) {
                tracing::debug!(topic = %topic, error = %error, "cleanup after failed bind failed");
            }
            return Err(bind_error(failure));
        }

        Ok(())
    }

    fn release(&mut self, topic: &Topic) {
        if let Err(error) = self.transport.unbind(topic) {
            tracing::warn!(
                code = CHANNEL_TEARDOWN_STEP_FAILED,
                topic = %topic,
                error = %error,
                "unbind failed, continuing teardown"
            );
        }
        if let Err(error) = self.transport.unsubscribe(topic) {
            tracing::warn!(
                code = CHANNEL_TEARDOWN_STEP_FAILED,
                topic = %topic,
                error = %error,
                "unsubscribe failed, continuing teardown"
            );
        }
    }

    fn set_state(&mut self, state: BridgeState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "channel state transition");
        }
        self.state = state;
        self.status.on_state_changed(state, self.bound.len());
    }

    fn report(&self, error: &SubscriptionError) {
        self.status.on_subscription_error(error);
    }
}

impl Drop for RealtimeChannelBridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}
