use genie_relay_core::ApplicationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned HTTP {status}: {body}")]
    Status { operation: &'static str, status: u16, body: String },
    #[error("{operation} response could not be decoded: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("conversation {conversation_id} did not reach a terminal status after {attempts} attempts")]
    PollTimeout { conversation_id: String, attempts: u32 },
    #[error("genie client could not be built: {0}")]
    Client(#[source] reqwest::Error),
}

impl GenieError {
    pub fn is_poll_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
            Self::PollTimeout { .. } => "poll_conversation",
            Self::Client(_) => "client_setup",
        }
    }
}

impl From<GenieError> for ApplicationError {
    fn from(value: GenieError) -> Self {
        match value {
            GenieError::PollTimeout { attempts, .. } => Self::PollTimeout { attempts },
            GenieError::Client(source) => Self::Configuration(source.to_string()),
            other => Self::BackendUnavailable {
                operation: other.operation().to_owned(),
                message: other.to_string(),
            },
        }
    }
}
