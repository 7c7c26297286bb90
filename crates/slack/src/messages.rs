use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

/// Body shared by the immediate webhook reply and `response_url` deliveries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackResponse {
    pub response_type: ResponseType,
    pub text: String,
}

impl SlackResponse {
    pub fn in_channel(text: impl Into<String>) -> Self {
        Self { response_type: ResponseType::InChannel, text: text.into() }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { response_type: ResponseType::Ephemeral, text: text.into() }
    }
}

pub fn acknowledgement(text: impl Into<String>) -> SlackResponse {
    SlackResponse::in_channel(text)
}

pub fn busy_message() -> SlackResponse {
    SlackResponse::ephemeral(
        "Too many questions are being answered right now. Please try again in a minute.",
    )
}

/// The question is quoted above the answer so the channel can see what was asked.
pub fn answer_message(question: &str, formatted_answer: &str) -> SlackResponse {
    SlackResponse::in_channel(format!("{}\n{formatted_answer}", quote_block(question)))
}

pub fn failure_message(question: &str, detail: &str) -> SlackResponse {
    SlackResponse::in_channel(format!("{}\n{detail}", quote_block(question)))
}

fn quote_block(text: &str) -> String {
    text.lines().map(|line| format!("> {line}")).collect::<Vec<_>>().join("\n")
}
