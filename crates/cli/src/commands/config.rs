use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use genie_relay_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigField {
    ConfigField { key, value, env_keys }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = vec![
        field(
            "slack.signing_secret",
            redact_secret(config.slack.signing_secret.expose_secret()),
            &["GENIE_RELAY_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"],
        ),
        field(
            "slack.command_path",
            config.slack.command_path.clone(),
            &["GENIE_RELAY_SLACK_COMMAND_PATH"],
        ),
        field(
            "slack.max_timestamp_skew_secs",
            config.slack.max_timestamp_skew_secs.to_string(),
            &["GENIE_RELAY_SLACK_MAX_TIMESTAMP_SKEW_SECS"],
        ),
        field(
            "slack.ack_template",
            config.slack.ack_template.clone(),
            &["GENIE_RELAY_SLACK_ACK_TEMPLATE"],
        ),
        field(
            "genie.base_url",
            config.genie.base_url.clone(),
            &["GENIE_RELAY_GENIE_BASE_URL", "DATABRICKS_URL"],
        ),
        field(
            "genie.token",
            redact_token(config.genie.token.expose_secret()),
            &["GENIE_RELAY_GENIE_TOKEN", "DATABRICKS_TOKEN"],
        ),
        field(
            "genie.space_id",
            config.genie.space_id.clone(),
            &["GENIE_RELAY_GENIE_SPACE_ID", "SPACE_ID"],
        ),
        field(
            "genie.request_timeout_secs",
            config.genie.request_timeout_secs.to_string(),
            &["GENIE_RELAY_GENIE_REQUEST_TIMEOUT_SECS"],
        ),
        field(
            "genie.poll_interval_secs",
            config.genie.poll_interval_secs.to_string(),
            &["GENIE_RELAY_GENIE_POLL_INTERVAL_SECS"],
        ),
        field(
            "genie.max_poll_attempts",
            config.genie.max_poll_attempts.to_string(),
            &["GENIE_RELAY_GENIE_MAX_POLL_ATTEMPTS"],
        ),
        field(
            "dispatch.max_concurrent_tasks",
            config.dispatch.max_concurrent_tasks.to_string(),
            &["GENIE_RELAY_DISPATCH_MAX_CONCURRENT_TASKS"],
        ),
        field(
            "dispatch.queue_capacity",
            config.dispatch.queue_capacity.to_string(),
            &["GENIE_RELAY_DISPATCH_QUEUE_CAPACITY"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["GENIE_RELAY_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["GENIE_RELAY_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["GENIE_RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["GENIE_RELAY_LOGGING_LEVEL", "GENIE_RELAY_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["GENIE_RELAY_LOGGING_FORMAT", "GENIE_RELAY_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for ConfigField { key, value, env_keys } in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the `dapi` style prefix so operators can tell token kinds apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix = trimmed.get(..4).filter(|prefix| prefix.chars().all(char::is_alphabetic));
    if let Some(prefix) = prefix {
        return format!("{prefix}***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret, redact_token};

    #[test]
    fn token_redaction_keeps_only_alphabetic_prefix() {
        assert_eq!(redact_token("dapi0123456789abcdef"), "dapi***");
        assert_eq!(redact_token("12345678"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_secret("8f742231b10e"), "<redacted>");
    }

    #[test]
    fn dotted_paths_resolve_in_toml_doc() {
        let doc: Value = "[genie]\nspace_id = \"s-1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "genie.space_id"));
        assert!(!contains_path(&doc, "genie.token"));
    }
}
