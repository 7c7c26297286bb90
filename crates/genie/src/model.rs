use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one message inside one backend conversation. Lives for a single command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHandle {
    pub conversation_id: String,
    pub message_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct StartConversationRequest<'a> {
    pub content: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct StartConversationResponse {
    pub conversation_id: String,
    pub message_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageStatus(pub String);

impl MessageStatus {
    pub const COMPLETED: &'static str = "COMPLETED";
    pub const FAILED: &'static str = "FAILED";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_completed(&self) -> bool {
        self.0 == Self::COMPLETED
    }

    pub fn is_failed(&self) -> bool {
        self.0 == Self::FAILED
    }

    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.is_failed()
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("UNKNOWN")
        } else {
            f.write_str(&self.0)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
}

impl Attachment {
    /// True when the attachment references a generated SQL query whose rows live behind a
    /// separate query-result call.
    pub fn has_query(&self) -> bool {
        match &self.query {
            Some(Value::Object(fields)) => !fields.is_empty(),
            Some(Value::String(sql)) => !sql.trim().is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub fn query_sql(&self) -> Option<String> {
        match &self.query {
            Some(Value::String(sql)) => Some(sql.clone()),
            Some(query) => query.get("query").and_then(Value::as_str).map(str::to_owned),
            None => None,
        }
    }

    pub fn query_description(&self) -> Option<String> {
        self.query
            .as_ref()
            .and_then(|query| query.get("description"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenieMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl GenieMessage {
    pub fn first_attachment(&self) -> Option<&Attachment> {
        self.attachments.as_ref().and_then(|attachments| attachments.first())
    }

    pub fn error_detail(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(message) => Some(message.clone()),
            Value::Object(fields) => fields
                .get("error")
                .or_else(|| fields.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResultResponse {
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub statement_response: Option<Value>,
}

impl QueryResultResponse {
    /// The first attachment's `text` payload, or the raw statement response when the
    /// backend returned rows without wrapping them in an attachment.
    pub fn payload(&self) -> Option<Value> {
        self.attachments
            .as_ref()
            .and_then(|attachments| attachments.first())
            .and_then(|attachment| attachment.text.clone())
            .or_else(|| self.statement_response.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnswerContent {
    Payload(Value),
    Unavailable { status: MessageStatus, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryAnswer {
    pub question: String,
    pub conversation_id: String,
    pub sql: Option<String>,
    pub description: Option<String>,
    pub content: AnswerContent,
}
