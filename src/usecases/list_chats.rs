use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::chat::{ChatResponsible, ChatSummary};

pub const DEFAULT_CHAT_PAGE_SIZE: u32 = 20;
const MAX_CHAT_PAGE_SIZE: u32 = 100;

/// Query for one page of a tab's chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatListFilter {
    pub search: Option<String>,
    pub responsible: ChatResponsible,
    pub unread: bool,
    pub not_answered: bool,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ChatListFilter {
    fn default() -> Self {
        Self {
            search: None,
            responsible: ChatResponsible::Worker,
            unread: false,
            not_answered: false,
            page: 1,
            per_page: DEFAULT_CHAT_PAGE_SIZE,
        }
    }
}

impl ChatListFilter {
    pub fn for_tab(responsible: ChatResponsible) -> Self {
        Self {
            responsible,
            ..Self::default()
        }
    }

    fn normalized(&self) -> Self {
        let per_page = match self.per_page {
            0 => DEFAULT_CHAT_PAGE_SIZE,
            value if value > MAX_CHAT_PAGE_SIZE => MAX_CHAT_PAGE_SIZE,
            value => value,
        };
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_owned);

        Self {
            search,
            page: self.page.max(1),
            per_page,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListPage {
    #[serde(default)]
    pub items: Vec<ChatSummary>,
    #[serde(default)]
    pub has_more_pages: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatListSourceError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("unavailable")]
    Unavailable,
    #[error("invalid data")]
    InvalidData,
    #[error("unknown failure")]
    Unknown,
}

pub trait ChatListSource {
    fn list_chats(&self, filter: &ChatListFilter) -> Result<ChatListPage, ChatListSourceError>;
}

impl<T: ChatListSource + ?Sized> ChatListSource for &T {
    fn list_chats(&self, filter: &ChatListFilter) -> Result<ChatListPage, ChatListSourceError> {
        (*self).list_chats(filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ListChatsError {
    #[error("not authorized to list chats")]
    Unauthorized,
    #[error("chat list is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("chat list payload was malformed")]
    DataContractViolation,
}

impl ListChatsError {
    pub fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "CHAT_LIST_UNAUTHORIZED",
            Self::TemporarilyUnavailable => "CHAT_LIST_UNAVAILABLE",
            Self::DataContractViolation => "CHAT_LIST_INVALID_DATA",
        }
    }
}

pub fn list_chats(
    source: &dyn ChatListSource,
    filter: &ChatListFilter,
) -> Result<ChatListPage, ListChatsError> {
    source
        .list_chats(&filter.normalized())
        .map_err(map_source_error)
}

fn map_source_error(error: ChatListSourceError) -> ListChatsError {
    match error {
        ChatListSourceError::Unauthorized => ListChatsError::Unauthorized,
        ChatListSourceError::Unavailable | ChatListSourceError::Unknown => {
            ListChatsError::TemporarilyUnavailable
        }
        ChatListSourceError::InvalidData => ListChatsError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource {
        result: Result<ChatListPage, ChatListSourceError>,
        captured: std::sync::Mutex<Option<ChatListFilter>>,
    }

    impl StubSource {
        fn with_result(result: Result<ChatListPage, ChatListSourceError>) -> Self {
            Self {
                result,
                captured: std::sync::Mutex::new(None),
            }
        }

        fn captured(&self) -> ChatListFilter {
            self.captured
                .lock()
                .expect("filter lock")
                .clone()
                .expect("source was called")
        }
    }

    impl ChatListSource for StubSource {
        fn list_chats(
            &self,
            filter: &ChatListFilter,
        ) -> Result<ChatListPage, ChatListSourceError> {
            *self.captured.lock().expect("filter lock") = Some(filter.clone());
            self.result.clone()
        }
    }

    fn sample_page() -> ChatListPage {
        ChatListPage {
            items: vec![ChatSummary {
                id: 42,
                lead_id: Some(7),
                title: "Jane Carrier".to_owned(),
                last_message_preview: Some("hello".to_owned()),
                last_message_at: None,
                unread_count: 3,
                is_pinned: false,
                responsible: ChatResponsible::Ai,
            }],
            has_more_pages: true,
        }
    }

    #[test]
    fn normalizes_page_size_and_page_number() {
        let source = StubSource::with_result(Ok(sample_page()));
        let filter = ChatListFilter {
            page: 0,
            per_page: 999,
            ..ChatListFilter::default()
        };

        list_chats(&source, &filter).expect("list should succeed");

        let captured = source.captured();
        assert_eq!(captured.page, 1);
        assert_eq!(captured.per_page, 100);
    }

    #[test]
    fn drops_blank_search() {
        let source = StubSource::with_result(Ok(sample_page()));
        let filter = ChatListFilter {
            search: Some("   ".to_owned()),
            ..ChatListFilter::for_tab(ChatResponsible::Ai)
        };

        list_chats(&source, &filter).expect("list should succeed");

        let captured = source.captured();
        assert_eq!(captured.search, None);
        assert_eq!(captured.responsible, ChatResponsible::Ai);
    }

    #[test]
    fn keeps_source_payload_without_mutation() {
        let source = StubSource::with_result(Ok(sample_page()));

        let output =
            list_chats(&source, &ChatListFilter::default()).expect("list should succeed");

        assert_eq!(output, sample_page());
    }

    #[test]
    fn maps_unknown_error_to_temporarily_unavailable() {
        let source = StubSource::with_result(Err(ChatListSourceError::Unknown));

        let err = list_chats(&source, &ChatListFilter::default()).expect_err("must fail");

        assert_eq!(err, ListChatsError::TemporarilyUnavailable);
    }

    #[test]
    fn maps_invalid_data_error_to_contract_violation() {
        let source = StubSource::with_result(Err(ChatListSourceError::InvalidData));

        let err = list_chats(&source, &ChatListFilter::default()).expect_err("must fail");

        assert_eq!(err, ListChatsError::DataContractViolation);
        assert_eq!(err.code(), "CHAT_LIST_INVALID_DATA");
    }
}
