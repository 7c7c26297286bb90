use thiserror::Error;

/// Failures raised after the slash command was acknowledged. They have no path back to
/// the original HTTP caller, so each one is rendered into a callback message instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("backend unavailable during {operation}: {message}")]
    BackendUnavailable { operation: String, message: String },
    #[error("conversation did not reach a terminal status after {attempts} attempts")]
    PollTimeout { attempts: u32 },
    #[error("callback delivery failed: {0}")]
    Delivery(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    /// Text posted to the callback URL when a background task fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendUnavailable { .. } => {
                "⚠️ The data assistant is unavailable right now. Please try again shortly."
                    .to_string()
            }
            Self::PollTimeout { .. } => {
                "⚠️ The data assistant did not finish answering in time. Try a narrower question."
                    .to_string()
            }
            Self::Delivery(_) | Self::Configuration(_) => {
                "⚠️ An unexpected error occurred while answering your question.".to_string()
            }
        }
    }
}
