use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{
    AppConfig, ChannelConfig, ChatListConfig, HistoryConfig, LogConfig, NotificationConfig,
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub channel: Option<FileChannelConfig>,
    pub history: Option<FileHistoryConfig>,
    pub chat_list: Option<FileChatListConfig>,
    pub notifications: Option<FileNotificationConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(channel) = self.channel {
            channel.merge_into(&mut config.channel);
        }

        if let Some(history) = self.history {
            history.merge_into(&mut config.history);
        }

        if let Some(chat_list) = self.chat_list {
            chat_list.merge_into(&mut config.chat_list);
        }

        if let Some(notifications) = self.notifications {
            notifications.merge_into(&mut config.notifications);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileChannelConfig {
    pub app_key: Option<String>,
    pub cluster: Option<String>,
    pub auth_endpoint: Option<String>,
    pub subscribe_attempts: Option<u32>,
}

impl FileChannelConfig {
    fn merge_into(self, config: &mut ChannelConfig) {
        if let Some(app_key) = self.app_key {
            config.app_key = app_key;
        }

        if let Some(cluster) = self.cluster {
            config.cluster = cluster;
        }

        if let Some(auth_endpoint) = self.auth_endpoint {
            config.auth_endpoint = auth_endpoint;
        }

        if let Some(attempts) = self.subscribe_attempts {
            config.subscribe_attempts = attempts.max(1);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileHistoryConfig {
    pub per_page: Option<u32>,
}

impl FileHistoryConfig {
    fn merge_into(self, config: &mut HistoryConfig) {
        if let Some(per_page) = self.per_page {
            config.per_page = per_page;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileChatListConfig {
    pub per_page: Option<u32>,
    pub insert_unknown_chats: Option<bool>,
}

impl FileChatListConfig {
    fn merge_into(self, config: &mut ChatListConfig) {
        if let Some(per_page) = self.per_page {
            config.per_page = per_page;
        }

        if let Some(insert) = self.insert_unknown_chats {
            config.insert_unknown_chats = insert;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNotificationConfig {
    pub dedupe_window_ms: Option<u64>,
}

impl FileNotificationConfig {
    fn merge_into(self, config: &mut NotificationConfig) {
        if let Some(window) = self.dedupe_window_ms {
            config.dedupe_window_ms = window;
        }
    }
}
