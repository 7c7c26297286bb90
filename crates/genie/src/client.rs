use std::time::Duration;

use async_trait::async_trait;
use genie_relay_core::config::GenieConfig;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::GenieError;
use crate::model::{
    ConversationHandle, GenieMessage, QueryResultResponse, StartConversationRequest,
    StartConversationResponse,
};

/// The three REST calls of a Genie conversation.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn start_conversation(&self, content: &str) -> Result<ConversationHandle, GenieError>;

    async fn get_message(&self, handle: &ConversationHandle) -> Result<GenieMessage, GenieError>;

    async fn get_query_result(
        &self,
        handle: &ConversationHandle,
        attachment_id: &str,
    ) -> Result<QueryResultResponse, GenieError>;
}

pub struct GenieClient {
    client: Client,
    base_url: String,
    space_id: String,
    token: SecretString,
}

impl std::fmt::Debug for GenieClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenieClient")
            .field("base_url", &self.base_url)
            .field("space_id", &self.space_id)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GenieClient {
    pub fn new(
        base_url: impl Into<String>,
        space_id: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, GenieError> {
        let client = Client::builder().timeout(timeout).build().map_err(GenieError::Client)?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, space_id: space_id.into(), token })
    }

    pub fn from_config(config: &GenieConfig) -> Result<Self, GenieError> {
        Self::new(
            config.base_url.clone(),
            config.space_id.clone(),
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn space_url(&self) -> String {
        format!("{}/spaces/{}", self.base_url, self.space_id)
    }

    fn message_url(&self, handle: &ConversationHandle) -> String {
        format!(
            "{}/conversations/{}/messages/{}",
            self.space_url(),
            handle.conversation_id,
            handle.message_id
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret())
    }
}

#[async_trait]
impl ConversationApi for GenieClient {
    async fn start_conversation(&self, content: &str) -> Result<ConversationHandle, GenieError> {
        const OPERATION: &str = "start_conversation";

        let url = format!("{}/start-conversation", self.space_url());
        let request = self.authorized(self.client.post(url)).json(&StartConversationRequest {
            content,
        });
        let started: StartConversationResponse = send_json(OPERATION, request).await?;

        Ok(ConversationHandle {
            conversation_id: started.conversation_id,
            message_id: started.message_id,
        })
    }

    async fn get_message(&self, handle: &ConversationHandle) -> Result<GenieMessage, GenieError> {
        let request = self.authorized(self.client.get(self.message_url(handle)));
        send_json("poll_conversation", request).await
    }

    async fn get_query_result(
        &self,
        handle: &ConversationHandle,
        attachment_id: &str,
    ) -> Result<QueryResultResponse, GenieError> {
        let url = format!("{}/query-result/{attachment_id}", self.message_url(handle));
        let request = self.authorized(self.client.get(url));
        send_json("fetch_results", request).await
    }
}

async fn send_json<T>(operation: &'static str, request: RequestBuilder) -> Result<T, GenieError>
where
    T: DeserializeOwned,
{
    let response =
        request.send().await.map_err(|source| GenieError::Transport { operation, source })?;
    let response = ensure_success(operation, response).await?;

    debug!(event_name = "genie.api.response", operation, "genie call succeeded");
    response.json::<T>().await.map_err(|source| GenieError::Decode { operation, source })
}

async fn ensure_success(operation: &'static str, response: Response) -> Result<Response, GenieError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GenieError::Status { operation, status: status.as_u16(), body })
}
