//! Use case layer: session workflows and orchestration.

pub mod bootstrap;
pub mod chat_session;
pub mod context;
pub mod contracts;
pub mod list_chats;
pub mod load_messages;
pub mod logout;
pub mod notifications;
pub mod replay;
pub mod send_message;
pub mod session_driver;
pub mod worker;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
