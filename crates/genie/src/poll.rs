use std::time::Duration;

use genie_relay_core::config::GenieConfig;
use tracing::{debug, info, warn};

use crate::client::ConversationApi;
use crate::error::GenieError;
use crate::model::{ConversationHandle, GenieMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30), max_attempts: 20 }
    }
}

impl PollPolicy {
    pub fn from_config(config: &GenieConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Fetches the message until it is `COMPLETED` or `FAILED`.
///
/// Waits with `tokio::time::sleep` between attempts, so a pending poll does not hold a
/// runtime worker. The wait after the final attempt is skipped.
pub async fn poll_until_terminal<A>(
    api: &A,
    handle: &ConversationHandle,
    policy: &PollPolicy,
) -> Result<GenieMessage, GenieError>
where
    A: ConversationApi + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        let message = api.get_message(handle).await?;

        debug!(
            event_name = "genie.poll.attempt",
            conversation_id = %handle.conversation_id,
            attempt,
            max_attempts = policy.max_attempts,
            status = %message.status,
            "polled conversation status"
        );

        if message.status.is_completed() {
            info!(
                event_name = "genie.poll.completed",
                conversation_id = %handle.conversation_id,
                attempt,
                "conversation completed"
            );
            return Ok(message);
        }
        if message.status.is_failed() {
            warn!(
                event_name = "genie.poll.failed",
                conversation_id = %handle.conversation_id,
                attempt,
                detail = message.error_detail().as_deref().unwrap_or("none"),
                "conversation failed"
            );
            return Ok(message);
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(GenieError::PollTimeout {
        conversation_id: handle.conversation_id.clone(),
        attempts: policy.max_attempts,
    })
}
