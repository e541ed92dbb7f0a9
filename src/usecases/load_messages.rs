use serde::Deserialize;
use thiserror::Error;

use crate::domain::{message::Message, open_chat_state::HistoryRequest};

pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 20;
const MAX_HISTORY_PAGE_SIZE: u32 = 100;

/// One page of chat history, newest message first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesPage {
    #[serde(default)]
    pub items: Vec<Message>,
    #[serde(default)]
    pub has_more_pages: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagesSourceError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("unavailable")]
    Unavailable,
    #[error("invalid data")]
    InvalidData,
    #[error("chat not found")]
    ChatNotFound,
}

pub trait MessagesSource {
    fn fetch_messages(
        &self,
        chat_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagesPage, MessagesSourceError>;
}

impl<T> MessagesSource for &T
where
    T: MessagesSource + ?Sized,
{
    fn fetch_messages(
        &self,
        chat_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagesPage, MessagesSourceError> {
        (*self).fetch_messages(chat_id, page, per_page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadMessagesError {
    #[error("not authorized to read this chat")]
    Unauthorized,
    #[error("message history is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("message history payload was malformed")]
    DataContractViolation,
    #[error("chat not found")]
    ChatNotFound,
}

impl LoadMessagesError {
    pub fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "HISTORY_UNAUTHORIZED",
            Self::TemporarilyUnavailable => "HISTORY_UNAVAILABLE",
            Self::DataContractViolation => "HISTORY_INVALID_DATA",
            Self::ChatNotFound => "HISTORY_CHAT_NOT_FOUND",
        }
    }
}

pub fn normalize_page_size(per_page: u32) -> u32 {
    match per_page {
        0 => DEFAULT_HISTORY_PAGE_SIZE,
        value if value > MAX_HISTORY_PAGE_SIZE => MAX_HISTORY_PAGE_SIZE,
        value => value,
    }
}

/// Runs the fetch described by `request` against `source`.
pub fn load_messages(
    source: &dyn MessagesSource,
    request: &HistoryRequest,
) -> Result<MessagesPage, LoadMessagesError> {
    let per_page = normalize_page_size(request.per_page);
    source
        .fetch_messages(request.chat_id, request.page.max(1), per_page)
        .map_err(map_source_error)
}

pub fn map_source_error(error: MessagesSourceError) -> LoadMessagesError {
    match error {
        MessagesSourceError::Unauthorized => LoadMessagesError::Unauthorized,
        MessagesSourceError::Unavailable => LoadMessagesError::TemporarilyUnavailable,
        MessagesSourceError::InvalidData => LoadMessagesError::DataContractViolation,
        MessagesSourceError::ChatNotFound => LoadMessagesError::ChatNotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource {
        result: Result<MessagesPage, MessagesSourceError>,
        captured: std::sync::Mutex<Option<(i64, u32, u32)>>,
    }

    impl StubSource {
        fn with_result(result: Result<MessagesPage, MessagesSourceError>) -> Self {
            Self {
                result,
                captured: std::sync::Mutex::new(None),
            }
        }

        fn captured(&self) -> Option<(i64, u32, u32)> {
            *self.captured.lock().expect("captured lock")
        }
    }

    impl MessagesSource for StubSource {
        fn fetch_messages(
            &self,
            chat_id: i64,
            page: u32,
            per_page: u32,
        ) -> Result<MessagesPage, MessagesSourceError> {
            *self.captured.lock().expect("captured lock") = Some((chat_id, page, per_page));
            self.result.clone()
        }
    }

    fn request(page: u32, per_page: u32) -> HistoryRequest {
        HistoryRequest {
            id: 1,
            chat_id: 42,
            page,
            per_page,
        }
    }

    fn empty_page() -> MessagesPage {
        MessagesPage {
            items: Vec::new(),
            has_more_pages: false,
        }
    }

    #[test]
    fn passes_chat_page_and_size_to_source() {
        let source = StubSource::with_result(Ok(empty_page()));

        load_messages(&source, &request(3, 25)).expect("load should succeed");

        assert_eq!(source.captured(), Some((42, 3, 25)));
    }

    #[test]
    fn uses_default_size_when_zero_and_caps_large_sizes() {
        let source = StubSource::with_result(Ok(empty_page()));

        load_messages(&source, &request(1, 0)).expect("load should succeed");
        assert_eq!(source.captured(), Some((42, 1, DEFAULT_HISTORY_PAGE_SIZE)));

        load_messages(&source, &request(1, 999)).expect("load should succeed");
        assert_eq!(source.captured(), Some((42, 1, 100)));
    }

    #[test]
    fn keeps_source_payload_without_mutation() {
        let page = MessagesPage {
            items: Vec::new(),
            has_more_pages: true,
        };
        let source = StubSource::with_result(Ok(page.clone()));

        let output = load_messages(&source, &request(1, 20)).expect("load should succeed");

        assert_eq!(output, page);
    }

    #[test]
    fn maps_source_errors() {
        let source = StubSource::with_result(Err(MessagesSourceError::Unavailable));

        let err = load_messages(&source, &request(1, 20)).expect_err("must fail");

        assert_eq!(err, LoadMessagesError::TemporarilyUnavailable);
        assert_eq!(err.code(), "HISTORY_UNAVAILABLE");
    }

    #[test]
    fn decodes_backend_page() {
        let raw = r#"{"items": [], "hasMorePages": true}"#;

        let page: MessagesPage = serde_json::from_str(raw).expect("page decodes");

        assert!(page.has_more_pages);
    }
}
