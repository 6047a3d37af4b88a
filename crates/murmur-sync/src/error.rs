use thiserror::Error;

use murmur_types::api::ApiErrorBody;
use murmur_types::models::{ChannelId, MessageId};

/// History/REST failures. Never retried automatically.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{message}")]
    Api {
        status: String,
        message: String,
        details: Option<String>,
    },

    #[error("request failed with HTTP {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<ApiErrorBody> for FetchError {
    fn from(body: ApiErrorBody) -> Self {
        Self::Api {
            status: body.status,
            message: body.message,
            details: body.details,
        }
    }
}

impl FetchError {
    fn api_status(&self) -> Option<&str> {
        match self {
            Self::Api { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.api_status() == Some("unauthorized") || matches!(self, Self::Http(401))
    }

    pub fn is_validation(&self) -> bool {
        self.api_status() == Some("unprocessable_entity") || matches!(self, Self::Http(422))
    }

    pub fn is_not_found(&self) -> bool {
        self.api_status() == Some("not_found") || matches!(self, Self::Http(404))
    }

    /// Text fit for a toast: the backend's details if it sent any, else its message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                details: Some(details),
                ..
            } => details.clone(),
            Self::Api { message, .. } => message.clone(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

/// Live-channel failures.
#[derive(Debug, Clone, Error)]
pub enum LiveError {
    #[error("no active subscription for channel {0}")]
    NotSubscribed(ChannelId),

    #[error("subscription to channel {0} was rejected")]
    Rejected(ChannelId),

    #[error("subscription to channel {0} timed out")]
    Timeout(ChannelId),

    #[error("live connection closed")]
    Closed,

    #[error("failed to encode action: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no channel selected")]
    NoChannel,

    #[error("message is empty")]
    EmptyMessage,

    #[error("message {0} is not loaded")]
    UnknownMessage(MessageId),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Live(#[from] LiveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_details() {
        let err = FetchError::from(ApiErrorBody {
            status: "unprocessable_entity".into(),
            message: "Validation failed".into(),
            details: Some("Content can't be blank".into()),
        });
        assert!(err.is_validation());
        assert!(!err.is_unauthorized());
        assert_eq!(err.user_message(), "Content can't be blank");
    }

    #[test]
    fn test_status_classification_falls_back_to_http_code() {
        assert!(FetchError::Http(401).is_unauthorized());
        assert!(FetchError::Http(404).is_not_found());
        assert!(!FetchError::Transport("reset".into()).is_not_found());
        assert_eq!(
            FetchError::Decode("eof".into()).user_message(),
            "An unexpected error occurred"
        );
    }
}
