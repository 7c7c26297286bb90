//! Delivery of deferred answers through the per-command `response_url`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::messages::SlackResponse;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("response_url request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("response_url returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, response_url: &str, message: &SlackResponse)
        -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug)]
pub struct ResponseUrlClient {
    client: Client,
}

impl ResponseUrlClient {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build().map_err(DeliveryError::Transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResponseSink for ResponseUrlClient {
    async fn deliver(
        &self,
        response_url: &str,
        message: &SlackResponse,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(response_url)
            .json(message)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status: status.as_u16(), body });
        }

        debug!(
            event_name = "slack.response_url.delivered",
            status = status.as_u16(),
            "response_url delivery accepted"
        );
        Ok(())
    }
}
