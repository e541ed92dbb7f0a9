use serde::Serialize;

use super::chat::{ChatResponsible, ChatSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatListUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

/// What to do with a chat that has activity but is listed in neither tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownChatPolicy {
    /// Leave the lists alone; the chat shows up on the next list reload.
    #[default]
    Ignore,
    /// Insert the chat at the front of the tab it is assigned to.
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteOutcome {
    Promoted {
        from: ChatResponsible,
        to: ChatResponsible,
    },
    Inserted(ChatResponsible),
    NotListed,
}

/// Pagination of one tab's list. Independent of message pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatListCursor {
    pub page: u32,
    pub has_more_pages: bool,
}

impl Default for ChatListCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_more_pages: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TabList {
    ui_state: ChatListUiState,
    chats: Vec<ChatSummary>,
    cursor: ChatListCursor,
}

impl Default for TabList {
    fn default() -> Self {
        Self {
            ui_state: ChatListUiState::Loading,
            chats: Vec::new(),
            cursor: ChatListCursor::default(),
        }
    }
}

impl TabList {
    fn refresh_ui_state(&mut self) {
        self.ui_state = if self.chats.is_empty() {
            ChatListUiState::Empty
        } else {
            ChatListUiState::Ready
        };
    }
}

/// The two chat-list tabs, each ordered most recent activity first.
///
/// A chat id is listed in at most one tab at any time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatTabs {
    active: ChatResponsible,
    ai: TabList,
    worker: TabList,
}

impl ChatTabs {
    pub fn active_tab(&self) -> ChatResponsible {
        self.active
    }

    pub fn set_active_tab(&mut self, tab: ChatResponsible) {
        self.active = tab;
    }

    pub fn chats(&self, tab: ChatResponsible) -> &[ChatSummary] {
        &self.list(tab).chats
    }

    pub fn ui_state(&self, tab: ChatResponsible) -> ChatListUiState {
        self.list(tab).ui_state
    }

    pub fn cursor(&self, tab: ChatResponsible) -> ChatListCursor {
        self.list(tab).cursor
    }

    pub fn set_loading(&mut self, tab: ChatResponsible) {
        self.list_mut(tab).ui_state = ChatListUiState::Loading;
    }

    pub fn set_error(&mut self, tab: ChatResponsible) {
        self.list_mut(tab).ui_state = ChatListUiState::Error;
    }

    /// Looks a chat up in both tabs.
    pub fn find(&self, chat_id: i64) -> Option<(ChatResponsible, &ChatSummary)> {
        [ChatResponsible::Worker, ChatResponsible::Ai]
            .into_iter()
            .find_map(|tab| {
                self.list(tab)
                    .chats
                    .iter()
                    .find(|chat| chat.id == chat_id)
                    .map(|chat| (tab, chat))
            })
    }

    /// Overwrites a tab's list with a fresh first page.
    pub fn replace(&mut self, tab: ChatResponsible, chats: Vec<ChatSummary>, has_more_pages: bool) {
        let other = other_tab(tab);
        for chat in &chats {
            self.take(other, chat.id);
        }

        let list = self.list_mut(tab);
        list.chats = dedupe_by_id(chats);
        list.cursor = ChatListCursor {
            page: 1,
            has_more_pages,
        };
        list.refresh_ui_state();
    }

    /// Appends a further page of a tab's list.
    pub fn append(
        &mut self,
        tab: ChatResponsible,
        page: u32,
        chats: Vec<ChatSummary>,
        has_more_pages: bool,
    ) {
        for chat in &chats {
            self.take(other_tab(tab), chat.id);
        }

        let list = self.list_mut(tab);
        for chat in chats {
            if list.chats.iter().any(|listed| listed.id == chat.id) {
                continue;
            }
            list.chats.push(chat);
        }
        list.cursor = ChatListCursor {
            page,
            has_more_pages,
        };
        list.refresh_ui_state();
    }

    /// Moves `chat` to the front of the tab matching its assignment.
    pub fn promote(&mut self, chat: ChatSummary, policy: UnknownChatPolicy) -> PromoteOutcome {
        let to = chat.responsible;
        let from = [ChatResponsible::Worker, ChatResponsible::Ai]
            .into_iter()
            .find(|tab| self.take(*tab, chat.id).is_some());

        let outcome = match (from, policy) {
            (Some(from), _) => PromoteOutcome::Promoted { from, to },
            (None, UnknownChatPolicy::Insert) => PromoteOutcome::Inserted(to),
            (None, UnknownChatPolicy::Ignore) => return PromoteOutcome::NotListed,
        };

        let list = self.list_mut(to);
        list.chats.insert(0, chat);
        list.refresh_ui_state();

        if let Some(from) = from {
            self.list_mut(from).refresh_ui_state();
        }

        outcome
    }

    pub fn increment_unread(&mut self, chat_id: i64) {
        if let Some(chat) = self.find_mut(chat_id) {
            chat.unread_count = chat.unread_count.saturating_add(1);
        }
    }

    pub fn mark_read(&mut self, chat_id: i64) {
        if let Some(chat) = self.find_mut(chat_id) {
            chat.unread_count = 0;
        }
    }

    /// Drops every row of `tab` matching the chat or its lead.
    pub fn remove(&mut self, tab: ChatResponsible, chat_id: i64, lead_id: Option<i64>) {
        let list = self.list_mut(tab);
        list.chats
            .retain(|chat| chat.id != chat_id && (lead_id.is_none() || chat.lead_id != lead_id));
        list.refresh_ui_state();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn take(&mut self, tab: ChatResponsible, chat_id: i64) -> Option<ChatSummary> {
        let list = self.list_mut(tab);
        let index = list.chats.iter().position(|chat| chat.id == chat_id)?;
        Some(list.chats.remove(index))
    }

    fn find_mut(&mut self, chat_id: i64) -> Option<&mut ChatSummary> {
        let in_worker = self.worker.chats.iter().any(|chat| chat.id == chat_id);
        let list = if in_worker {
            &mut self.worker
        } else {
            &mut self.ai
        };
        list.chats.iter_mut().find(|chat| chat.id == chat_id)
    }

    fn list(&self, tab: ChatResponsible) -> &TabList {
        match tab {
            ChatResponsible::Ai => &self.ai,
            ChatResponsible::Worker => &self.worker,
        }
    }

    fn list_mut(&mut self, tab: ChatResponsible) -> &mut TabList {
        match tab {
            ChatResponsible::Ai => &mut self.ai,
            ChatResponsible::Worker => &mut self.worker,
        }
    }
}

fn other_tab(tab: ChatResponsible) -> ChatResponsible {
    match tab {
        ChatResponsible::Ai => ChatResponsible::Worker,
        ChatResponsible::Worker => ChatResponsible::Ai,
    }
}

fn dedupe_by_id(chats: Vec<ChatSummary>) -> Vec<ChatSummary> {
    let mut seen = std::collections::HashSet::new();
    chats.into_iter().filter(|chat| seen.insert(chat.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: i64, responsible: ChatResponsible) -> ChatSummary {
        ChatSummary {
            id,
            lead_id: Some(id * 100),
            title: format!("chat {id}"),
            last_message_preview: None,
            last_message_at: None,
            unread_count: 0,
            is_pinned: false,
            responsible,
        }
    }

    fn ids(tabs: &ChatTabs, tab: ChatResponsible) -> Vec<i64> {
        tabs.chats(tab).iter().map(|chat| chat.id).collect()
    }

    #[test]
    fn default_tabs_are_loading_with_worker_active() {
        let tabs = ChatTabs::default();

        assert_eq!(tabs.active_tab(), ChatResponsible::Worker);
        assert_eq!(tabs.ui_state(ChatResponsible::Worker), ChatListUiState::Loading);
        assert_eq!(tabs.ui_state(ChatResponsible::Ai), ChatListUiState::Loading);
    }

    #[test]
    fn promote_moves_second_worker_chat_to_front() {
        let mut tabs = ChatTabs::default();
        tabs.replace(
            ChatResponsible::Worker,
            vec![
                chat(1, ChatResponsible::Worker),
                chat(2, ChatResponsible::Worker),
                chat(3, ChatResponsible::Worker),
            ],
            false,
        );
        tabs.replace(ChatResponsible::Ai, vec![chat(9, ChatResponsible::Ai)], false);

        let outcome = tabs.promote(chat(2, ChatResponsible::Worker), UnknownChatPolicy::Ignore);

        assert_eq!(
            outcome,
            PromoteOutcome::Promoted {
                from: ChatResponsible::Worker,
                to: ChatResponsible::Worker
            }
        );
        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![2, 1, 3]);
        assert_eq!(ids(&tabs, ChatResponsible::Ai), vec![9]);
    }

    #[test]
    fn promote_moves_reassigned_chat_between_tabs() {
        let mut tabs = ChatTabs::default();
        tabs.replace(
            ChatResponsible::Worker,
            vec![chat(1, ChatResponsible::Worker), chat(2, ChatResponsible::Worker)],
            false,
        );
        tabs.replace(ChatResponsible::Ai, vec![chat(9, ChatResponsible::Ai)], false);

        tabs.promote(chat(2, ChatResponsible::Ai), UnknownChatPolicy::Ignore);

        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![1]);
        assert_eq!(ids(&tabs, ChatResponsible::Ai), vec![2, 9]);
    }

    #[test]
    fn promote_unknown_chat_follows_policy() {
        let mut tabs = ChatTabs::default();
        tabs.replace(ChatResponsible::Worker, vec![chat(1, ChatResponsible::Worker)], false);

        let ignored = tabs.promote(chat(5, ChatResponsible::Worker), UnknownChatPolicy::Ignore);
        assert_eq!(ignored, PromoteOutcome::NotListed);
        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![1]);

        let inserted = tabs.promote(chat(5, ChatResponsible::Worker), UnknownChatPolicy::Insert);
        assert_eq!(inserted, PromoteOutcome::Inserted(ChatResponsible::Worker));
        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![5, 1]);
    }

    #[test]
    fn replace_sets_empty_state_for_empty_page() {
        let mut tabs = ChatTabs::default();

        tabs.replace(ChatResponsible::Ai, vec![], false);

        assert_eq!(tabs.ui_state(ChatResponsible::Ai), ChatListUiState::Empty);
    }

    #[test]
    fn replace_keeps_chat_in_only_one_tab() {
        let mut tabs = ChatTabs::default();
        tabs.replace(ChatResponsible::Worker, vec![chat(1, ChatResponsible::Worker)], false);

        tabs.replace(ChatResponsible::Ai, vec![chat(1, ChatResponsible::Ai)], false);

        assert!(tabs.chats(ChatResponsible::Worker).is_empty());
        assert_eq!(ids(&tabs, ChatResponsible::Ai), vec![1]);
    }

    #[test]
    fn append_skips_already_listed_chats_and_advances_cursor() {
        let mut tabs = ChatTabs::default();
        tabs.replace(
            ChatResponsible::Worker,
            vec![chat(1, ChatResponsible::Worker), chat(2, ChatResponsible::Worker)],
            true,
        );

        tabs.append(
            ChatResponsible::Worker,
            2,
            vec![chat(2, ChatResponsible::Worker), chat(3, ChatResponsible::Worker)],
            false,
        );

        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![1, 2, 3]);
        assert_eq!(
            tabs.cursor(ChatResponsible::Worker),
            ChatListCursor {
                page: 2,
                has_more_pages: false
            }
        );
    }

    #[test]
    fn unread_counter_increments_and_resets() {
        let mut tabs = ChatTabs::default();
        tabs.replace(ChatResponsible::Ai, vec![chat(4, ChatResponsible::Ai)], false);

        tabs.increment_unread(4);
        tabs.increment_unread(4);
        assert_eq!(tabs.find(4).map(|(_, chat)| chat.unread_count), Some(2));

        tabs.mark_read(4);
        assert_eq!(tabs.find(4).map(|(_, chat)| chat.unread_count), Some(0));
    }

    #[test]
    fn remove_drops_rows_by_chat_or_lead() {
        let mut tabs = ChatTabs::default();
        let mut same_lead = chat(2, ChatResponsible::Worker);
        same_lead.lead_id = Some(100);
        tabs.replace(
            ChatResponsible::Worker,
            vec![chat(1, ChatResponsible::Worker), same_lead, chat(3, ChatResponsible::Worker)],
            false,
        );

        tabs.remove(ChatResponsible::Worker, 1, Some(100));

        assert_eq!(ids(&tabs, ChatResponsible::Worker), vec![3]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut tabs = ChatTabs::default();
        tabs.set_active_tab(ChatResponsible::Ai);
        tabs.replace(ChatResponsible::Ai, vec![chat(1, ChatResponsible::Ai)], true);

        tabs.clear();

        assert_eq!(tabs, ChatTabs::default());
    }
}
