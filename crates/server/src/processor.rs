use std::sync::Arc;

use async_trait::async_trait;
use genie_relay_core::ApplicationError;
use genie_relay_genie::{format_query_answer, ConversationWorkflow, QueryAnswer};
use genie_relay_slack::messages::{answer_message, failure_message};
use genie_relay_slack::{QuestionRequest, ResponseSink, SlackResponse};
use tracing::{error, info};

use crate::dispatcher::{Job, JobHandler};

/// Answers one question and posts exactly one message to its `response_url`.
#[derive(Clone)]
pub struct QuestionProcessor {
    workflow: ConversationWorkflow,
    sink: Arc<dyn ResponseSink>,
}

impl QuestionProcessor {
    pub fn new(workflow: ConversationWorkflow, sink: Arc<dyn ResponseSink>) -> Self {
        Self { workflow, sink }
    }

    pub async fn answer(&self, request: &QuestionRequest) -> Result<QueryAnswer, ApplicationError> {
        Ok(self.workflow.ask(&request.question).await?)
    }

    async fn deliver(&self, correlation_id: &str, request: &QuestionRequest, message: SlackResponse) {
        match self.sink.deliver(&request.response_url, &message).await {
            Ok(()) => info!(
                event_name = "relay.delivery.sent",
                correlation_id,
                "answer delivered to response_url"
            ),
            Err(delivery) => {
                let failure = ApplicationError::Delivery(delivery.to_string());
                error!(
                    event_name = "relay.delivery.failed",
                    correlation_id,
                    error = %failure,
                    "answer could not be delivered"
                );
            }
        }
    }
}

#[async_trait]
impl JobHandler for QuestionProcessor {
    async fn handle(&self, job: Job) {
        let Job { correlation_id, request } = job;

        // The answer runs in its own task so a panic is caught here and still produces a
        // failure message for the user.
        let worker = self.clone();
        let worker_request = request.clone();
        let outcome = match tokio::spawn(async move { worker.answer(&worker_request).await }).await
        {
            Ok(outcome) => outcome,
            Err(join_error) => {
                Err(ApplicationError::Configuration(format!("answer task aborted: {join_error}")))
            }
        };

        let message = match outcome {
            Ok(answer) => {
                info!(
                    event_name = "relay.question.answered",
                    correlation_id = %correlation_id,
                    conversation_id = %answer.conversation_id,
                    user_id = request.user_id.as_deref().unwrap_or("unknown"),
                    channel_id = request.channel_id.as_deref().unwrap_or("unknown"),
                    "question answered"
                );
                answer_message(&request.question, &format_query_answer(&answer))
            }
            Err(failure) => {
                error!(
                    event_name = "relay.question.failed",
                    correlation_id = %correlation_id,
                    user_id = request.user_id.as_deref().unwrap_or("unknown"),
                    error = %failure,
                    "question could not be answered"
                );
                failure_message(&request.question, &failure.user_message())
            }
        };

        self.deliver(&correlation_id, &request, message).await;
    }
}
