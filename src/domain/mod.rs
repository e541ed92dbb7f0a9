//! Domain layer: chat entities, merge rules and session state.

pub mod chat;
pub mod chat_tabs;
pub mod date_label;
pub mod events;
pub mod message;
pub mod open_chat_state;
pub mod reconciler;
pub mod status;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
