use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "genie-relay.toml";
pub const NESTED_CONFIG_FILE: &str = "config/genie-relay.toml";

pub const DEFAULT_ACK_TEMPLATE: &str =
    "Hi <@{user}>! Your question was received. The answer will be posted here when it is ready!";

/// Process-wide settings. Loaded once at startup and treated as immutable afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub genie: GenieConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub signing_secret: SecretString,
    pub command_path: String,
    pub max_timestamp_skew_secs: u64,
    pub ack_template: String,
}

#[derive(Clone, Debug)]
pub struct GenieConfig {
    pub base_url: String,
    pub token: SecretString,
    pub space_id: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub max_concurrent_tasks: usize,
    pub queue_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_signing_secret: Option<String>,
    pub genie_base_url: Option<String>,
    pub genie_token: Option<String>,
    pub genie_space_id: Option<String>,
    pub genie_poll_interval_secs: Option<u64>,
    pub genie_max_poll_attempts: Option<u32>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                signing_secret: String::new().into(),
                command_path: "/slack/command".to_string(),
                max_timestamp_skew_secs: 300,
                ack_template: DEFAULT_ACK_TEMPLATE.to_string(),
            },
            genie: GenieConfig {
                base_url: String::new(),
                token: String::new().into(),
                space_id: String::new(),
                request_timeout_secs: 15,
                poll_interval_secs: 30,
                max_poll_attempts: 20,
            },
            dispatch: DispatchConfig { max_concurrent_tasks: 8, queue_capacity: 64 },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Formats the acknowledgement text for the given Slack user name.
    pub fn ack_message(&self, user_name: &str) -> String {
        self.slack.ack_template.replace("{user}", user_name)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret);
            }
            if let Some(command_path) = slack.command_path {
                self.slack.command_path = command_path;
            }
            if let Some(skew) = slack.max_timestamp_skew_secs {
                self.slack.max_timestamp_skew_secs = skew;
            }
            if let Some(ack_template) = slack.ack_template {
                self.slack.ack_template = ack_template;
            }
        }

        if let Some(genie) = patch.genie {
            if let Some(base_url) = genie.base_url {
                self.genie.base_url = base_url;
            }
            if let Some(token) = genie.token {
                self.genie.token = secret_value(token);
            }
            if let Some(space_id) = genie.space_id {
                self.genie.space_id = space_id;
            }
            if let Some(request_timeout_secs) = genie.request_timeout_secs {
                self.genie.request_timeout_secs = request_timeout_secs;
            }
            if let Some(poll_interval_secs) = genie.poll_interval_secs {
                self.genie.poll_interval_secs = poll_interval_secs;
            }
            if let Some(max_poll_attempts) = genie.max_poll_attempts {
                self.genie.max_poll_attempts = max_poll_attempts;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(max_concurrent_tasks) = dispatch.max_concurrent_tasks {
                self.dispatch.max_concurrent_tasks = max_concurrent_tasks;
            }
            if let Some(queue_capacity) = dispatch.queue_capacity {
                self.dispatch.queue_capacity = queue_capacity;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let signing_secret = read_env("GENIE_RELAY_SLACK_SIGNING_SECRET")
            .or_else(|| read_env("SLACK_SIGNING_SECRET"));
        if let Some(value) = signing_secret {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("GENIE_RELAY_SLACK_COMMAND_PATH") {
            self.slack.command_path = value;
        }
        if let Some(value) = read_env("GENIE_RELAY_SLACK_MAX_TIMESTAMP_SKEW_SECS") {
            self.slack.max_timestamp_skew_secs =
                parse_u64("GENIE_RELAY_SLACK_MAX_TIMESTAMP_SKEW_SECS", &value)?;
        }
        if let Some(value) = read_env("GENIE_RELAY_SLACK_ACK_TEMPLATE") {
            self.slack.ack_template = value;
        }

        let base_url =
            read_env("GENIE_RELAY_GENIE_BASE_URL").or_else(|| read_env("DATABRICKS_URL"));
        if let Some(value) = base_url {
            self.genie.base_url = value;
        }
        let token = read_env("GENIE_RELAY_GENIE_TOKEN").or_else(|| read_env("DATABRICKS_TOKEN"));
        if let Some(value) = token {
            self.genie.token = secret_value(value);
        }
        let space_id = read_env("GENIE_RELAY_GENIE_SPACE_ID").or_else(|| read_env("SPACE_ID"));
        if let Some(value) = space_id {
            self.genie.space_id = value;
        }
        if let Some(value) = read_env("GENIE_RELAY_GENIE_REQUEST_TIMEOUT_SECS") {
            self.genie.request_timeout_secs =
                parse_u64("GENIE_RELAY_GENIE_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GENIE_RELAY_GENIE_POLL_INTERVAL_SECS") {
            self.genie.poll_interval_secs =
                parse_u64("GENIE_RELAY_GENIE_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("GENIE_RELAY_GENIE_MAX_POLL_ATTEMPTS") {
            self.genie.max_poll_attempts =
                parse_u32("GENIE_RELAY_GENIE_MAX_POLL_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("GENIE_RELAY_DISPATCH_MAX_CONCURRENT_TASKS") {
            self.dispatch.max_concurrent_tasks =
                parse_usize("GENIE_RELAY_DISPATCH_MAX_CONCURRENT_TASKS", &value)?;
        }
        if let Some(value) = read_env("GENIE_RELAY_DISPATCH_QUEUE_CAPACITY") {
            self.dispatch.queue_capacity =
                parse_usize("GENIE_RELAY_DISPATCH_QUEUE_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("GENIE_RELAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GENIE_RELAY_SERVER_PORT") {
            self.server.port = parse_u16("GENIE_RELAY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GENIE_RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GENIE_RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("GENIE_RELAY_LOGGING_LEVEL").or_else(|| read_env("GENIE_RELAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GENIE_RELAY_LOGGING_FORMAT").or_else(|| read_env("GENIE_RELAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(base_url) = overrides.genie_base_url {
            self.genie.base_url = base_url;
        }
        if let Some(token) = overrides.genie_token {
            self.genie.token = secret_value(token);
        }
        if let Some(space_id) = overrides.genie_space_id {
            self.genie.space_id = space_id;
        }
        if let Some(poll_interval_secs) = overrides.genie_poll_interval_secs {
            self.genie.poll_interval_secs = poll_interval_secs;
        }
        if let Some(max_poll_attempts) = overrides.genie_max_poll_attempts {
            self.genie.max_poll_attempts = max_poll_attempts;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_genie(&self.genie)?;
        validate_dispatch(&self.dispatch)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string()
        ));
    }

    if !slack.command_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "slack.command_path must start with `/`".to_string(),
        ));
    }

    if slack.max_timestamp_skew_secs == 0 || slack.max_timestamp_skew_secs > 3600 {
        return Err(ConfigError::Validation(
            "slack.max_timestamp_skew_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_genie(genie: &GenieConfig) -> Result<(), ConfigError> {
    let base_url = genie.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "genie.base_url is required (e.g. https://<workspace>/api/2.0/genie)".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "genie.base_url must start with http:// or https://".to_string(),
        ));
    }

    if genie.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "genie.token is required. Create a personal access token in the Databricks workspace settings".to_string(),
        ));
    }

    if genie.space_id.trim().is_empty() {
        return Err(ConfigError::Validation("genie.space_id is required".to_string()));
    }

    if genie.request_timeout_secs == 0 || genie.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "genie.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if genie.poll_interval_secs == 0 || genie.poll_interval_secs > 600 {
        return Err(ConfigError::Validation(
            "genie.poll_interval_secs must be in range 1..=600".to_string(),
        ));
    }

    if genie.max_poll_attempts == 0 {
        return Err(ConfigError::Validation(
            "genie.max_poll_attempts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.max_concurrent_tasks == 0 {
        return Err(ConfigError::Validation(
            "dispatch.max_concurrent_tasks must be greater than zero".to_string(),
        ));
    }

    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "dispatch.queue_capacity must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    genie: Option<GeniePatch>,
    dispatch: Option<DispatchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    command_path: Option<String>,
    max_timestamp_skew_secs: Option<u64>,
    ack_template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeniePatch {
    base_url: Option<String>,
    token: Option<String>,
    space_id: Option<String>,
    request_timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    max_poll_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    max_concurrent_tasks: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: [(&str, &str); 4] = [
        ("GENIE_RELAY_SLACK_SIGNING_SECRET", "signing-secret"),
        ("GENIE_RELAY_GENIE_BASE_URL", "https://dbc.example.com/api/2.0/genie"),
        ("GENIE_RELAY_GENIE_TOKEN", "dapi-token"),
        ("GENIE_RELAY_GENIE_SPACE_ID", "space-1"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required_vars() {
        let keys: Vec<&str> = REQUIRED_VARS.iter().map(|(key, _)| *key).collect();
        clear_vars(&keys);
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GENIE_TOKEN", "dapi-from-env");
        env::set_var("TEST_SIGNING_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("genie-relay.toml");
            fs::write(
                &path,
                r#"
[slack]
signing_secret = "${TEST_SIGNING_SECRET}"

[genie]
base_url = "https://dbc.example.com/api/2.0/genie"
token = "${TEST_GENIE_TOKEN}"
space_id = "space-from-file"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.genie.token.expose_secret() == "dapi-from-env",
                "genie token should be interpolated from environment",
            )?;
            ensure(
                config.slack.signing_secret.expose_secret() == "secret-from-env",
                "signing secret should be interpolated from environment",
            )?;
            ensure(config.genie.space_id == "space-from-file", "space id should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_GENIE_TOKEN", "TEST_SIGNING_SECRET"]);
        result
    }

    #[test]
    fn defaults_match_documented_poll_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.genie.poll_interval_secs == 30, "poll interval should default to 30s")?;
            ensure(config.genie.max_poll_attempts == 20, "attempt cap should default to 20")?;
            ensure(config.slack.max_timestamp_skew_secs == 300, "skew should default to 300s")?;
            ensure(config.slack.command_path == "/slack/command", "default command path")?;
            Ok(())
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn legacy_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLACK_SIGNING_SECRET", "legacy-secret");
        env::set_var("DATABRICKS_URL", "https://legacy.example.com/api/2.0/genie");
        env::set_var("DATABRICKS_TOKEN", "dapi-legacy");
        env::set_var("SPACE_ID", "legacy-space");
        env::set_var("GENIE_RELAY_LOG_LEVEL", "warn");
        env::set_var("GENIE_RELAY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.slack.signing_secret.expose_secret() == "legacy-secret",
                "legacy signing secret name should be honored",
            )?;
            ensure(
                config.genie.base_url == "https://legacy.example.com/api/2.0/genie",
                "legacy base url name should be honored",
            )?;
            ensure(config.genie.space_id == "legacy-space", "legacy space id should be honored")?;
            ensure(config.logging.level == "warn", "log level alias should be honored")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "log format alias should be honored",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "SLACK_SIGNING_SECRET",
            "DATABRICKS_URL",
            "DATABRICKS_TOKEN",
            "SPACE_ID",
            "GENIE_RELAY_LOG_LEVEL",
            "GENIE_RELAY_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GENIE_RELAY_GENIE_POLL_INTERVAL_SECS", "10");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("genie-relay.toml");
            fs::write(
                &path,
                r#"
[genie]
space_id = "space-from-file"
poll_interval_secs = 5
max_poll_attempts = 3

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    genie_max_poll_attempts: Some(7),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.genie.max_poll_attempts == 7, "override attempt cap should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.genie.poll_interval_secs == 10, "env poll interval should beat file")?;
            ensure(config.genie.space_id == "space-1", "env space id should beat file")?;
            Ok(())
        })();

        clear_required_vars();
        clear_vars(&["GENIE_RELAY_GENIE_POLL_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GENIE_RELAY_GENIE_BASE_URL", "dbc.example.com");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("genie.base_url")
            );
            ensure(has_message, "validation failure should mention genie.base_url")
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn missing_signing_secret_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("GENIE_RELAY_SLACK_SIGNING_SECRET");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected missing signing secret to fail".to_string()),
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("slack.signing_secret"), "error should name the key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_required_vars();
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GENIE_RELAY_DISPATCH_QUEUE_CAPACITY", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override to fail".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "GENIE_RELAY_DISPATCH_QUEUE_CAPACITY",
                "error should name the variable",
            ),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_required_vars();
        clear_vars(&["GENIE_RELAY_DISPATCH_QUEUE_CAPACITY"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("GENIE_RELAY_GENIE_TOKEN", "dapi-secret-value");
        env::set_var("GENIE_RELAY_SLACK_SIGNING_SECRET", "signing-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("dapi-secret-value"), "debug output should not contain token")?;
            ensure(
                !debug.contains("signing-secret-value"),
                "debug output should not contain signing secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn ack_message_substitutes_user_name() -> Result<(), String> {
        let config = AppConfig::default();
        let message = config.ack_message("maria");
        ensure(message.starts_with("Hi <@maria>!"), "ack should mention the user")
    }
}
