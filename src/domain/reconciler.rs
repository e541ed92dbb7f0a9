//! Merge rules for one chat's message sequence.
//!
//! Every function here is pure: it takes the current sequence and an incoming
//! batch and returns the next sequence. Labels are rebuilt from scratch on each
//! call.

use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};

use super::{
    date_label::{day_label, parse_created_at, sort_key, Clock},
    message::{DisplayMessage, Message, MessageId, MessageStatus},
};

const RECONCILE_INVALID_TIMESTAMP: &str = "RECONCILE_INVALID_TIMESTAMP";
const RECONCILE_DUPLICATE_CONFLICT: &str = "RECONCILE_DUPLICATE_CONFLICT";
const RECONCILE_FOREIGN_MESSAGE: &str = "RECONCILE_FOREIGN_MESSAGE";
const RECONCILE_TEMPORARY_ID_MISSING: &str = "RECONCILE_TEMPORARY_ID_MISSING";

/// Ordered, deduplicated, labelled messages of a single chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSequence {
    chat_id: i64,
    entries: Vec<DisplayMessage>,
}

impl MessageSequence {
    pub fn empty(chat_id: i64) -> Self {
        Self {
            chat_id,
            entries: Vec::new(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn entries(&self) -> &[DisplayMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&DisplayMessage> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }
}

/// Merges one history page into the sequence.
///
/// `page` is newest-first, as the backend returns it. Page 1 replaces the
/// sequence; later pages are older history and go in front of it. Entries the
/// page repeats are taken from the page, which is the most recently applied
/// version.
pub fn merge_history_page(
    current: &MessageSequence,
    page: Vec<Message>,
    page_number: u32,
    clock: &dyn Clock,
) -> MessageSequence {
    let chat_id = current.chat_id;
    let page = collapse_duplicates(
        page.into_iter()
            .filter(|message| belongs_to(chat_id, message))
            .collect(),
    );

    let mut merged: Vec<Message> = page.into_iter().rev().collect();

    if page_number > 1 {
        let page_ids: HashSet<&MessageId> = merged.iter().map(|message| &message.id).collect();
        let mut retained = Vec::with_capacity(current.len());

        for existing in current.messages() {
            if page_ids.contains(&existing.id) {
                if let Some(incoming) = merged.iter().find(|message| message.id == existing.id) {
                    report_conflict(existing, incoming);
                }
                continue;
            }
            retained.push(existing.clone());
        }

        merged.extend(retained);
    }

    sort_and_label(chat_id, merged, clock)
}

/// Folds one live message into the sequence.
///
/// Messages for another chat leave the sequence unchanged. A known id has its
/// body and status replaced in place; anything else is appended.
pub fn merge_live_message(
    current: &MessageSequence,
    incoming: Message,
    clock: &dyn Clock,
) -> MessageSequence {
    if incoming.chat_id != current.chat_id {
        return current.clone();
    }

    let mut messages: Vec<Message> = current.messages().cloned().collect();

    if let Some(index) = current.position(&incoming.id) {
        let existing = &mut messages[index];
        existing.body = incoming.body;
        if incoming.status.is_some() {
            existing.status = incoming.status;
        }
        if incoming.error_message.is_some() {
            existing.error_message = incoming.error_message;
        }
        return label_in_order(current.chat_id, messages, clock);
    }

    messages.push(incoming);
    sort_and_label(current.chat_id, messages, clock)
}

/// Swaps an optimistic entry for the server-confirmed message, keeping its slot.
///
/// Does nothing when the temporary id is gone, e.g. because a page-1 reload
/// replaced the sequence while the send was in flight.
pub fn replace_temporary_id(
    current: &MessageSequence,
    temporary_id: &str,
    confirmed: Message,
    clock: &dyn Clock,
) -> MessageSequence {
    let pending_id = MessageId::Pending(temporary_id.to_owned());
    let Some(mut index) = current.position(&pending_id) else {
        tracing::debug!(
            code = RECONCILE_TEMPORARY_ID_MISSING,
            temporary_id,
            chat_id = current.chat_id,
            "temporary message no longer present; confirmation ignored"
        );
        return current.clone();
    };

    let mut messages: Vec<Message> = current.messages().cloned().collect();

    // The server echo may have arrived over the channel before the send returned.
    if let Some(echo_index) = messages.iter().position(|message| message.id == confirmed.id) {
        report_conflict(&messages[echo_index], &confirmed);
        messages.remove(echo_index);
        if echo_index < index {
            index -= 1;
        }
    }

    messages[index] = confirmed;
    label_in_order(current.chat_id, messages, clock)
}

pub fn update_status(
    current: &MessageSequence,
    id: &MessageId,
    status: MessageStatus,
    clock: &dyn Clock,
) -> MessageSequence {
    amend(current, id, clock, |message| message.status = Some(status))
}

/// Marks an optimistic send as failed, keeping it visible with the reason.
pub fn mark_send_failed(
    current: &MessageSequence,
    temporary_id: &str,
    reason: &str,
    clock: &dyn Clock,
) -> MessageSequence {
    let id = MessageId::Pending(temporary_id.to_owned());
    amend(current, &id, clock, |message| {
        message.status = Some(MessageStatus::Failed);
        message.error_message = Some(reason.to_owned());
    })
}

fn amend<F>(current: &MessageSequence, id: &MessageId, clock: &dyn Clock, mutator: F) -> MessageSequence
where
    F: FnOnce(&mut Message),
{
    let Some(index) = current.position(id) else {
        return current.clone();
    };

    let mut messages: Vec<Message> = current.messages().cloned().collect();
    mutator(&mut messages[index]);
    label_in_order(current.chat_id, messages, clock)
}

fn belongs_to(chat_id: i64, message: &Message) -> bool {
    if message.chat_id == chat_id {
        return true;
    }

    tracing::warn!(
        code = RECONCILE_FOREIGN_MESSAGE,
        chat_id,
        message_chat_id = message.chat_id,
        message_id = %message.id,
        "history page carried a message of another chat; dropped"
    );
    false
}

/// Keeps the last occurrence of every id, at the position of that occurrence.
fn collapse_duplicates(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Message> = messages
        .into_iter()
        .rev()
        .filter(|message| seen.insert(message.id.clone()))
        .collect();
    kept.reverse();
    kept
}

fn report_conflict(existing: &Message, incoming: &Message) {
    if existing != incoming {
        tracing::debug!(
            code = RECONCILE_DUPLICATE_CONFLICT,
            message_id = %incoming.id,
            chat_id = incoming.chat_id,
            "duplicate message id with differing payload; keeping latest"
        );
    }
}

fn sort_and_label(chat_id: i64, messages: Vec<Message>, clock: &dyn Clock) -> MessageSequence {
    let now = clock.now();
    let zone = *now.offset();

    let mut keyed: Vec<(Option<NaiveDateTime>, Message)> = messages
        .into_iter()
        .map(|message| (parse_created_at(&message.created_at, &zone), message))
        .collect();
    keyed.sort_by_key(|(created_at, _)| sort_key(*created_at));

    build(chat_id, keyed, now.date_naive())
}

fn label_in_order(chat_id: i64, messages: Vec<Message>, clock: &dyn Clock) -> MessageSequence {
    let now = clock.now();
    let zone: FixedOffset = *now.offset();

    let keyed = messages
        .into_iter()
        .map(|message| (parse_created_at(&message.created_at, &zone), message))
        .collect();

    build(chat_id, keyed, now.date_naive())
}

fn build(
    chat_id: i64,
    keyed: Vec<(Option<NaiveDateTime>, Message)>,
    today: NaiveDate,
) -> MessageSequence {
    let mut entries = Vec::with_capacity(keyed.len());
    let mut previous_label: Option<String> = None;

    for (created_at, message) in keyed {
        if created_at.is_none() {
            tracing::debug!(
                code = RECONCILE_INVALID_TIMESTAMP,
                message_id = %message.id,
                chat_id,
                "message timestamp is unparsable; sorted as newest"
            );
        }

        let label = day_label(created_at, today);
        let show_label = previous_label.as_deref() != Some(label.as_str());
        previous_label = Some(label.clone());

        entries.push(DisplayMessage {
            message,
            formatted_date_label: label,
            show_label,
        });
    }

    MessageSequence { chat_id, entries }
}
