use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    domain::chat_tabs::UnknownChatPolicy,
    usecases::{
        chat_session::StoreSettings, list_chats::DEFAULT_CHAT_PAGE_SIZE,
        load_messages::DEFAULT_HISTORY_PAGE_SIZE,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub channel: ChannelConfig,
    pub history: HistoryConfig,
    pub chat_list: ChatListConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn store_settings(&self) -> StoreSettings {
        let unknown_chat_policy = if self.chat_list.insert_unknown_chats {
            UnknownChatPolicy::Insert
        } else {
            UnknownChatPolicy::Ignore
        };

        StoreSettings {
            history_per_page: self.history.per_page,
            chat_list_per_page: self.chat_list.per_page,
            unknown_chat_policy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Also write logs to this file. Stderr only when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    pub app_key: String,
    pub cluster: String,
    pub auth_endpoint: String,
    pub subscribe_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            app_key: "replace-me".to_owned(),
            cluster: "eu".to_owned(),
            auth_endpoint: "/broadcasting/auth".to_owned(),
            subscribe_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    pub per_page: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatListConfig {
    pub per_page: u32,
    pub insert_unknown_chats: bool,
}

impl Default for ChatListConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_CHAT_PAGE_SIZE,
            insert_unknown_chats: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    pub dedupe_window_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dedupe_window_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_ignore_unknown_chats() {
        let settings = AppConfig::default().store_settings();

        assert_eq!(settings, StoreSettings::default());
    }

    #[test]
    fn insert_flag_selects_insert_policy() {
        let mut config = AppConfig::default();
        config.chat_list.insert_unknown_chats = true;
        config.history.per_page = 50;

        let settings = config.store_settings();

        assert_eq!(settings.unknown_chat_policy, UnknownChatPolicy::Insert);
        assert_eq!(settings.history_per_page, 50);
    }
}
