use thiserror::Error;

use crate::infra::secrets::redact_text;

use super::{auth::ChannelCredentials, router::EventRouter, topic::Topic};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport {operation} failed: {reason}")]
pub struct TransportFailure {
    pub operation: &'static str,
    pub reason: String,
}

impl TransportFailure {
    /// The reason is scrubbed of credentials before it can reach a log line
    /// or a notification.
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: redact_text(&reason.into()),
        }
    }
}

/// Push-service client used by the bridge.
///
/// Frames received after `bind` are handed to the router given to `connect`;
/// connection drops and automatic reconnects are reported through
/// [`EventRouter::signal`].
pub trait ChannelTransport: Send {
    fn connect(&mut self, router: EventRouter) -> Result<(), TransportFailure>;
    fn subscribe(
        &mut self,
        topic: &Topic,
        credentials: &ChannelCredentials,
    ) -> Result<(), TransportFailure>;
    fn bind(&mut self, topic: &Topic) -> Result<(), TransportFailure>;
    fn unbind(&mut self, topic: &Topic) -> Result<(), TransportFailure>;
    fn unsubscribe(&mut self, topic: &Topic) -> Result<(), TransportFailure>;
    fn disconnect(&mut self) -> Result<(), TransportFailure>;
}
