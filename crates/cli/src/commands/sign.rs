use chrono::Utc;
use genie_relay_core::config::{AppConfig, LoadOptions};
use genie_relay_slack::compute_signature;

use crate::commands::CommandResult;

/// Produces the `curl` headers for a signed slash-command body.
pub fn run(timestamp: Option<i64>, body: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("sign", "config_validation", error.to_string(), 2);
        }
    };

    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp()).to_string();
    match compute_signature(&config.slack.signing_secret, &timestamp, body.as_bytes()) {
        Ok(signature) => CommandResult::success(
            "sign",
            format!(
                "-H 'X-Slack-Request-Timestamp: {timestamp}' -H 'X-Slack-Signature: {signature}'"
            ),
        ),
        Err(error) => CommandResult::failure("sign", "signature", error.to_string(), 3),
    }
}
