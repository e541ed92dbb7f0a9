use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityHealth {
    Unknown,
    Ok,
    Degraded,
    Unavailable,
}

impl ConnectivityHealth {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Unknown => "CONNECTIVITY_UNKNOWN",
            Self::Ok => "CONNECTIVITY_OK",
            Self::Degraded => "CONNECTIVITY_DEGRADED",
            Self::Unavailable => "CONNECTIVITY_UNAVAILABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub code: String,
    pub at_unix_ms: u128,
}

/// Snapshot of the real-time channel as shown in the console status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub connectivity: ConnectivityHealth,
    pub bound_topics: usize,
    pub updated_at_unix_ms: u128,
    pub last_error: Option<StatusError>,
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityHealth::Unknown,
            bound_topics: 0,
            updated_at_unix_ms: now_unix_ms(),
            last_error: None,
        }
    }
}

pub fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
