use crate::{realtime::bridge::RealtimeChannelBridge, usecases::chat_session::ChatSessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub topics_released: usize,
    pub closed_chat: Option<i64>,
}

/// Releases every channel topic and forgets all session state. Safe to call
/// more than once.
pub fn logout_and_reset(
    store: &mut ChatSessionStore,
    bridge: &mut RealtimeChannelBridge,
) -> LogoutOutcome {
    let topics_released = bridge.bound_topics().len();
    let closed_chat = store.active_chat_id();

    store.clear(bridge);
    tracing::info!(topics_released, closed_chat, "logged out");

    LogoutOutcome {
        topics_released,
        closed_chat,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        domain::{
            chat::{ChatResponsible, ChatSummary},
            date_label::SystemClock,
            status::ConnectivityHealth,
        },
        realtime::{
            auth::SessionTokenAuthorizer, bridge::BridgeState, loopback::LoopbackTransport,
            topic::Topic,
        },
        usecases::chat_session::StoreSettings,
    };

    fn bridge() -> RealtimeChannelBridge {
        let (transport, _handle) = LoopbackTransport::new();
        RealtimeChannelBridge::new(
            Box::new(transport),
            Box::new(SessionTokenAuthorizer::new(Some("token".to_owned()))),
            1,
        )
    }

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

    #[test]
    fn logout_releases_topics_and_clears_open_chat() {
        let mut store = ChatSessionStore::new(Arc::new(SystemClock), StoreSettings::default());
        let mut bridge = bridge();
        let _inbox = bridge.subscribe(&Topic::inbox(1)).expect("inbox bound");
        let mut chat_stream = bridge.subscribe(&Topic::chat(4)).expect("chat bound");
        store.open_chat(chat(4));

        let outcome = logout_and_reset(&mut store, &mut bridge);

        assert_eq!(
            outcome,
            LogoutOutcome {
                topics_released: 2,
                closed_chat: Some(4),
            }
        );
        assert_eq!(bridge.state(), BridgeState::Disconnected);
        assert_eq!(
            bridge.status().snapshot().connectivity,
            ConnectivityHealth::Unavailable
        );
        assert!(store.active_chat_id().is_none());
        assert!(chat_stream.try_next().is_none());
        assert!(chat_stream.is_closed());
    }

    #[test]
    fn logout_is_idempotent() {
        let mut store = ChatSessionStore::new(Arc::new(SystemClock), StoreSettings::default());
        let mut bridge = bridge();

        let first = logout_and_reset(&mut store, &mut bridge);
        let second = logout_and_reset(&mut store, &mut bridge);

        assert_eq!(first, second);
        assert_eq!(second.topics_released, 0);
        assert_eq!(second.closed_chat, None);
    }
}
