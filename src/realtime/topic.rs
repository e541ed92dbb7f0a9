use std::fmt;

/// Name of a channel on the push service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Per-conversation channel carrying message events of one chat.
    pub fn chat(chat_id: i64) -> Self {
        Self(format!("private-chat.{chat_id}"))
    }

    /// Operator channel carrying activity for every chat the operator can see.
    pub fn inbox(user_id: i64) -> Self {
        Self(format!("private-inbox.{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
