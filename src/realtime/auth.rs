use std::{
    fmt,
    sync::{Arc, RwLock},
};

use thiserror::Error;

use crate::infra::secrets::{redact_text, REDACTED};

use super::topic::Topic;

/// Credentials for one subscribe call. Never kept beyond that call.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelCredentials {
    bearer_token: String,
}

impl ChannelCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.bearer_token
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

impl fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("bearer_token", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("no session token is available")]
    MissingToken,
    #[error("channel authorization rejected: {reason}")]
    Rejected { reason: String },
}

impl AuthorizationError {
    /// Builds a rejection from backend text, scrubbing anything token-like.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: redact_text(&reason.into()),
        }
    }
}

/// Supplies credentials at subscribe time. Invoked again on every
/// (re)subscribe because the session token may rotate.
pub trait ChannelAuthorizer: Send {
    fn authorize(&self, topic: &Topic) -> Result<ChannelCredentials, AuthorizationError>;
}

/// Reads the current session bearer token from a shared slot.
#[derive(Debug, Clone, Default)]
pub struct SessionTokenAuthorizer {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionTokenAuthorizer {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
        }
    }

    pub fn rotate(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.into());
        }
    }

    pub fn revoke(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

impl ChannelAuthorizer for SessionTokenAuthorizer {
    fn authorize(&self, _topic: &Topic) -> Result<ChannelCredentials, AuthorizationError> {
        let token = self
            .token
            .read()
            .map_err(|_| AuthorizationError::MissingToken)?
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or(AuthorizationError::MissingToken)?;

        Ok(ChannelCredentials::bearer(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let credentials = ChannelCredentials::bearer("abc123secret");

        let rendered = format!("{credentials:?}");

        assert!(!rendered.contains("abc123secret"));
        assert!(rendered.contains(REDACTED));
        assert_eq!(credentials.authorization_header(), "Bearer abc123secret");
    }

    #[test]
    fn authorizer_reads_token_at_call_time() {
        let authorizer = SessionTokenAuthorizer::new(Some("first".to_owned()));
        let topic = Topic::chat(1);

        let before = authorizer.authorize(&topic).expect("token present");
        authorizer.rotate("second");
        let after = authorizer.authorize(&topic).expect("token present");

        assert_eq!(before.token(), "first");
        assert_eq!(after.token(), "second");
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        let authorizer = SessionTokenAuthorizer::new(Some("  ".to_owned()));
        let topic = Topic::chat(1);

        assert_eq!(
            authorizer.authorize(&topic),
            Err(AuthorizationError::MissingToken)
        );

        authorizer.rotate("token");
        authorizer.revoke();
        assert_eq!(
            authorizer.authorize(&topic),
            Err(AuthorizationError::MissingToken)
        );
    }

    #[test]
    fn rejection_text_is_scrubbed() {
        let error = AuthorizationError::rejected("token=abc123secret expired");

        let rendered = error.to_string();

        assert!(!rendered.contains("abc123secret"));
        assert!(rendered.ends_with("expired"));
    }
}
