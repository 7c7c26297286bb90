use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use genie_relay_core::{AppConfig, InterfaceError};
use genie_relay_slack::messages::{acknowledgement, busy_message};
use genie_relay_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use genie_relay_slack::{parse_slash_command, SignatureVerifier};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatcher::{DispatchError, Dispatcher, Job};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct WebhookState {
    config: Arc<AppConfig>,
    verifier: Arc<SignatureVerifier>,
    dispatcher: Dispatcher,
}

impl WebhookState {
    pub fn new(config: Arc<AppConfig>, dispatcher: Dispatcher) -> Self {
        let verifier = SignatureVerifier::new(
            config.slack.signing_secret.clone(),
            Duration::from_secs(config.slack.max_timestamp_skew_secs),
        );
        Self { config, verifier: Arc::new(verifier), dispatcher }
    }
}

/// Maps an `InterfaceError` onto the HTTP reply Slack shows to the user. The correlation
/// id travels in `x-correlation-id` so a rejection can be matched to its log line.
pub struct Rejection(pub InterfaceError);

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let correlation_id = self.0.correlation_id().to_owned();
        (status, [(CORRELATION_HEADER, correlation_id)], self.0.user_message()).into_response()
    }
}

pub fn router(state: WebhookState) -> Router {
    let command_path = state.config.slack.command_path.clone();
    Router::new()
        .route(&command_path, post(receive_command))
        .with_state(state)
}

/// Verifies, validates and acknowledges a slash command. Never waits on the backend.
pub async fn receive_command(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Rejection> {
    let correlation_id = Uuid::new_v4().to_string();

    state
        .verifier
        .verify(
            header_value(&headers, TIMESTAMP_HEADER),
            header_value(&headers, SIGNATURE_HEADER),
            &body,
            Utc::now().timestamp(),
        )
        .map_err(|error| {
            warn!(
                event_name = "relay.webhook.signature_rejected",
                correlation_id = %correlation_id,
                error = %error,
                "slash command failed signature verification"
            );
            Rejection(InterfaceError::bad_request(error.to_string(), &correlation_id))
        })?;

    let request = parse_slash_command(&body)
        .and_then(|payload| payload.into_question())
        .map_err(|error| {
            warn!(
                event_name = "relay.webhook.invalid_command",
                correlation_id = %correlation_id,
                error = %error,
                "slash command payload rejected"
            );
            Rejection(InterfaceError::bad_request(error.to_string(), &correlation_id))
        })?;

    let ack = acknowledgement(state.config.ack_message(&request.user_name));
    let user_id = request.user_id.clone().unwrap_or_else(|| "unknown".to_owned());
    let channel_id = request.channel_id.clone().unwrap_or_else(|| "unknown".to_owned());

    match state.dispatcher.try_submit(Job { correlation_id: correlation_id.clone(), request }) {
        Ok(()) => {
            info!(
                event_name = "relay.webhook.accepted",
                correlation_id = %correlation_id,
                user_id = %user_id,
                channel_id = %channel_id,
                "slash command accepted"
            );
            Ok(Json(ack).into_response())
        }
        Err(DispatchError::QueueFull { .. }) => Ok(Json(busy_message()).into_response()),
        Err(DispatchError::Closed) => Err(Rejection(InterfaceError::ServiceUnavailable {
            message: DispatchError::Closed.to_string(),
            correlation_id,
        })),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use genie_relay_core::config::DispatchConfig;
    use genie_relay_core::AppConfig;
    use genie_relay_slack::compute_signature;
    use secrecy::SecretString;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::{router, WebhookState, CORRELATION_HEADER};
    use crate::dispatcher::{Dispatcher, Job, JobHandler};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const FORM: &str = "token=t&team_id=T1&channel_id=C1&user_id=U1&user_name=ana&command=%2Fgenie\
        &text=top+customers&response_url=https%3A%2F%2Fhooks.slack.test%2Fcommands%2F1";

    /// Forwards each job to the test and then stays busy like a slow backend.
    struct SlowHandler {
        seen: mpsc::UnboundedSender<Job>,
    }

    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, job: Job) {
            let _ = self.seen.send(job);
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    fn app(dispatch: DispatchConfig) -> (Router, mpsc::UnboundedReceiver<Job>) {
        let mut config = AppConfig::default();
        config.slack.signing_secret = SecretString::from(SECRET.to_string());
        config.dispatch = dispatch.clone();

        let (seen, jobs) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::spawn(&dispatch, Arc::new(SlowHandler { seen }));
        (router(WebhookState::new(Arc::new(config), dispatcher)), jobs)
    }

    fn default_app() -> (Router, mpsc::UnboundedReceiver<Job>) {
        app(DispatchConfig { max_concurrent_tasks: 4, queue_capacity: 4 })
    }

    fn signed_request(body: &str, timestamp: i64) -> Request<Body> {
        let timestamp = timestamp.to_string();
        let secret = SecretString::from(SECRET.to_string());
        let signature =
            compute_signature(&secret, &timestamp, body.as_bytes()).expect("signature");
        Request::builder()
            .method("POST")
            .uri("/slack/command")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature)
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn valid_command_is_acknowledged_without_waiting_on_backend() {
        let (app, mut jobs) = default_app();

        let response = tokio::time::timeout(
            Duration::from_secs(2),
            app.oneshot(signed_request(FORM, Utc::now().timestamp())),
        )
        .await
        .expect("ack must not wait for the backend")
        .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let ack: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(ack["response_type"], "in_channel");
        assert!(ack["text"].as_str().expect("text").contains("<@ana>"));

        let job = jobs.recv().await.expect("job dispatched");
        assert_eq!(job.request.question, "top customers");
        assert_eq!(job.request.response_url, "https://hooks.slack.test/commands/1");
        assert_eq!(job.request.user_id.as_deref(), Some("U1"));
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected_even_with_valid_signature() {
        let (app, mut jobs) = default_app();

        let response =
            app.oneshot(signed_request(FORM, Utc::now().timestamp() - 301)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let (app, _jobs) = default_app();
        let mut request = signed_request(FORM, Utc::now().timestamp());
        *request.body_mut() = Body::from(FORM.replace("top+customers", "drop+tables"));

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let correlation_id = response.headers().get(CORRELATION_HEADER).expect("correlation id");
        assert_eq!(correlation_id.len(), 36);
    }

    #[tokio::test]
    async fn missing_signature_headers_are_rejected() {
        let (app, _jobs) = default_app();
        let request = Request::builder()
            .method("POST")
            .uri("/slack/command")
            .body(Body::from(FORM))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let (app, _jobs) = default_app();

        let response = app.oneshot(signed_request("", Utc::now().timestamp())).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("could not be processed"));
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected() {
        let (app, _jobs) = default_app();
        let body = "user_name=ana&text=&response_url=https%3A%2F%2Fhooks.slack.test%2F1";

        let response = app.oneshot(signed_request(body, Utc::now().timestamp())).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn full_queue_answers_with_ephemeral_busy_message() {
        let (app, mut jobs) = app(DispatchConfig { max_concurrent_tasks: 1, queue_capacity: 1 });

        // One running, one queued.
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(signed_request(FORM, Utc::now().timestamp()))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(jobs.recv().await.is_some());

        let response =
            app.oneshot(signed_request(FORM, Utc::now().timestamp())).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let reply: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(reply["response_type"], "ephemeral");
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let (app, _jobs) = default_app();
        let request =
            Request::builder().method("GET").uri("/slack/command").body(Body::empty()).expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
