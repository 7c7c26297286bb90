use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::ConversationApi;
use crate::error::GenieError;
use crate::model::{AnswerContent, ConversationHandle, GenieMessage, QueryAnswer};
use crate::poll::{poll_until_terminal, PollPolicy};

/// Start, poll, fetch: one question in, one answer out.
#[derive(Clone)]
pub struct ConversationWorkflow {
    api: Arc<dyn ConversationApi>,
    policy: PollPolicy,
}

impl ConversationWorkflow {
    pub fn new(api: Arc<dyn ConversationApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn ask(&self, question: &str) -> Result<QueryAnswer, GenieError> {
        let handle = self.api.start_conversation(question).await?;
        info!(
            event_name = "genie.conversation.started",
            conversation_id = %handle.conversation_id,
            message_id = %handle.message_id,
            "conversation started"
        );

        let message = poll_until_terminal(self.api.as_ref(), &handle, &self.policy).await?;
        let attachment = message.first_attachment();
        let sql = attachment.and_then(|attachment| attachment.query_sql());
        let description = attachment.and_then(|attachment| attachment.query_description());
        let content = self.extract_content(&handle, &message).await?;

        Ok(QueryAnswer {
            question: question.to_owned(),
            conversation_id: handle.conversation_id,
            sql,
            description,
            content,
        })
    }

    async fn extract_content(
        &self,
        handle: &ConversationHandle,
        message: &GenieMessage,
    ) -> Result<AnswerContent, GenieError> {
        if message.status.is_failed() {
            return Ok(unavailable(
                message,
                message.error_detail().unwrap_or_else(|| "the backend reported a failure".to_owned()),
            ));
        }

        let Some(attachment) = message.first_attachment() else {
            return Ok(match &message.content {
                Some(text) if !text.trim().is_empty() => {
                    AnswerContent::Payload(json!({ "content": text }))
                }
                _ => unavailable(message, "the answer had no attachments".to_owned()),
            });
        };

        if !attachment.has_query() {
            return Ok(match &attachment.text {
                Some(text) if !text.is_null() => AnswerContent::Payload(text.clone()),
                _ => unavailable(message, "the answer had no query or text".to_owned()),
            });
        }

        let Some(attachment_id) = attachment.attachment_id.as_deref() else {
            warn!(
                event_name = "genie.result.missing_attachment_id",
                conversation_id = %handle.conversation_id,
                "query attachment has no id, skipping result fetch"
            );
            return Ok(unavailable(message, "the query attachment had no id".to_owned()));
        };

        let result = self.api.get_query_result(handle, attachment_id).await?;
        info!(
            event_name = "genie.result.fetched",
            conversation_id = %handle.conversation_id,
            attachment_id,
            "query result fetched"
        );

        Ok(match result.payload() {
            Some(Value::Null) | None => unavailable(message, "the query result was empty".to_owned()),
            Some(payload) => AnswerContent::Payload(payload),
        })
    }
}

fn unavailable(message: &GenieMessage, reason: String) -> AnswerContent {
    AnswerContent::Unavailable { status: message.status.clone(), reason }
}
