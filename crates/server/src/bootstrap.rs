use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use genie_relay_core::config::AppConfig;
use genie_relay_genie::{ConversationWorkflow, GenieClient, GenieError, PollPolicy};
use genie_relay_slack::{DeliveryError, ResponseUrlClient};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::processor::QuestionProcessor;
use crate::{health, webhook};

pub struct Application {
    pub config: Arc<AppConfig>,
    pub dispatcher: Dispatcher,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("genie client setup failed: {0}")]
    Genie(#[source] GenieError),
    #[error("response_url client setup failed: {0}")]
    Delivery(#[source] DeliveryError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = Arc::new(config);

    let client = GenieClient::from_config(&config.genie).map_err(BootstrapError::Genie)?;
    info!(
        event_name = "system.bootstrap.genie_client_ready",
        correlation_id = "bootstrap",
        base_url = client.base_url(),
        space_id = %config.genie.space_id,
        "genie client configured"
    );

    let sink =
        ResponseUrlClient::new(Duration::from_secs(config.genie.request_timeout_secs))
            .map_err(BootstrapError::Delivery)?;
    let workflow =
        ConversationWorkflow::new(Arc::new(client), PollPolicy::from_config(&config.genie));
    let processor = QuestionProcessor::new(workflow, Arc::new(sink));
    let dispatcher = Dispatcher::spawn(&config.dispatch, Arc::new(processor));

    let router = webhook::router(webhook::WebhookState::new(config.clone(), dispatcher.clone()))
        .merge(health::router(dispatcher.clone()))
        .layer(TraceLayer::new_for_http());

    Ok(Application { config, dispatcher, router })
}
