use std::sync::{mpsc, Arc, Mutex};

use crate::domain::status::{now_unix_ms, ChannelStatus, ConnectivityHealth, StatusError};

use super::bridge::{BridgeState, SubscriptionError};

/// Shared view of channel health for whoever renders connection status.
#[derive(Clone, Debug, Default)]
pub struct ConnectionStatusTracker {
    inner: Arc<Mutex<TrackerState>>,
}

#[derive(Debug, Default)]
struct TrackerState {
    snapshot: ChannelStatus,
    subscribers: Vec<mpsc::Sender<ChannelStatus>>,
}

impl ConnectionStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<ChannelStatus> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut state) = self.inner.lock() {
            let _ = tx.send(state.snapshot.clone());
            state.subscribers.push(tx);
        }
        rx
    }

    pub fn snapshot(&self) -> ChannelStatus {
        self.inner
            .lock()
            .map(|state| state.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn on_state_changed(&self, state: BridgeState, bound_topics: usize) {
        self.mutate(|snapshot| {
            snapshot.connectivity = map_state(state);
            snapshot.bound_topics = bound_topics;
            if matches!(state, BridgeState::Subscribed) {
                snapshot.last_error = None;
            }
        });
    }

    pub fn on_subscription_error(&self, error: &SubscriptionError) {
        self.mutate(|snapshot| {
            snapshot.last_error = Some(StatusError {
                code: error.code().to_owned(),
                at_unix_ms: now_unix_ms(),
            });
        });
    }

    pub fn on_reset(&self) {
        self.mutate(|snapshot| {
            snapshot.connectivity = ConnectivityHealth::Unavailable;
            snapshot.bound_topics = 0;
            snapshot.last_error = None;
        });
    }

    fn mutate<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ChannelStatus),
    {
        if let Ok(mut state) = self.inner.lock() {
            mutator(&mut state.snapshot);
            state.snapshot.updated_at_unix_ms = now_unix_ms();
            let payload = state.snapshot.clone();
            state
                .subscribers
                .retain(|sub| sub.send(payload.clone()).is_ok());
        }
    }
}

fn map_state(state: BridgeState) -> ConnectivityHealth {
    match state {
        BridgeState::Connected | BridgeState::Subscribed => ConnectivityHealth::Ok,
        BridgeState::Connecting | BridgeState::Unsubscribing => ConnectivityHealth::Degraded,
        BridgeState::Disconnected => ConnectivityHealth::Unavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_initial_snapshot_on_subscribe() {
        let tracker = ConnectionStatusTracker::new();
        let rx = tracker.subscribe();
        let initial = rx.recv().expect("initial snapshot should be sent");

        assert_eq!(initial.connectivity, ConnectivityHealth::Unknown);
        assert_eq!(initial.bound_topics, 0);
        assert_eq!(initial.last_error, None);
    }

    #[test]
    fn maps_bridge_states_to_canonical_health() {
        let tracker = ConnectionStatusTracker::new();

        tracker.on_state_changed(BridgeState::Connecting, 0);
        assert_eq!(tracker.snapshot().connectivity, ConnectivityHealth::Degraded);

        tracker.on_state_changed(BridgeState::Subscribed, 2);
        assert_eq!(tracker.snapshot().connectivity, ConnectivityHealth::Ok);
        assert_eq!(tracker.snapshot().bound_topics, 2);

        tracker.on_state_changed(BridgeState::Unsubscribing, 2);
        assert_eq!(tracker.snapshot().connectivity, ConnectivityHealth::Degraded);

        tracker.on_state_changed(BridgeState::Disconnected, 0);
        assert_eq!(
            tracker.snapshot().connectivity,
            ConnectivityHealth::Unavailable
        );
    }

    #[test]
    fn subscription_error_is_recorded_until_next_subscribe() {
        let tracker = ConnectionStatusTracker::new();
        tracker.on_subscription_error(&SubscriptionError::ConnectionLost);

        assert_eq!(
            tracker.snapshot().last_error.map(|error| error.code),
            Some("CHANNEL_CONNECTION_LOST".to_owned())
        );

        tracker.on_state_changed(BridgeState::Subscribed, 1);
        assert!(tracker.snapshot().last_error.is_none());
    }

    #[test]
    fn subscribers_receive_every_change() {
        let tracker = ConnectionStatusTracker::new();
        let rx = tracker.subscribe();
        let _ = rx.recv();

        tracker.on_state_changed(BridgeState::Connected, 0);
        tracker.on_reset();

        let updates: Vec<_> = rx.try_iter().map(|status| status.connectivity).collect();
        assert_eq!(
            updates,
            vec![ConnectivityHealth::Ok, ConnectivityHealth::Unavailable]
        );
    }
}
