use serde::Deserialize;
use thiserror::Error;

/// Raw slash-command form as Slack posts it. Only a few fields drive logic; the rest are
/// kept for log context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlashCommandPayload {
    pub token: Option<String>,
    pub team_id: Option<String>,
    pub team_domain: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub command: Option<String>,
    pub text: Option<String>,
    pub api_app_id: Option<String>,
    pub is_enterprise_install: Option<String>,
    pub response_url: Option<String>,
    pub trigger_id: Option<String>,
}

/// A validated question ready for background processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionRequest {
    pub user_name: String,
    pub question: String,
    pub response_url: String,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub command: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("request body is empty")]
    EmptyPayload,
    #[error("request body is not a valid form: {0}")]
    MalformedForm(String),
    #[error("required form field `{0}` is missing")]
    MissingField(&'static str),
    #[error("response_url `{0}` is not an http(s) url")]
    InvalidResponseUrl(String),
}

/// Decodes a form-encoded slash-command body.
pub fn parse_slash_command(body: &[u8]) -> Result<SlashCommandPayload, CommandParseError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(CommandParseError::EmptyPayload);
    }

    serde_urlencoded::from_bytes::<SlashCommandPayload>(body)
        .map_err(|error| CommandParseError::MalformedForm(error.to_string()))
}

impl SlashCommandPayload {
    pub fn into_question(self) -> Result<QuestionRequest, CommandParseError> {
        let user_name = required(self.user_name, "user_name")?;
        let question = required(self.text, "text")?;
        let response_url = required(self.response_url, "response_url")?;

        if !response_url.starts_with("https://") && !response_url.starts_with("http://") {
            return Err(CommandParseError::InvalidResponseUrl(response_url));
        }

        Ok(QuestionRequest {
            user_name,
            question,
            response_url,
            user_id: non_blank(self.user_id),
            channel_id: non_blank(self.channel_id),
            command: non_blank(self.command),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, CommandParseError> {
    non_blank(value).ok_or(CommandParseError::MissingField(field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_owned()).filter(|trimmed| !trimmed.is_empty())
}
