use std::sync::Arc;

use genie_relay_core::config::{AppConfig, LoadOptions};
use genie_relay_core::ApplicationError;
use genie_relay_genie::{
    format_query_answer, ConversationWorkflow, GenieClient, PollPolicy, QueryAnswer,
};

use crate::commands::CommandResult;

/// Runs one question through start, poll and fetch, then prints the formatted answer
/// followed by the generated SQL when there is one.
pub fn run(question: &str) -> CommandResult {
    let question = question.trim();
    if question.is_empty() {
        return CommandResult::failure("ask", "invalid_input", "question must not be empty", 3);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_initialization",
                format!("failed to initialize async runtime: {error}"),
                4,
            );
        }
    };

    match runtime.block_on(ask(&config, question)) {
        Ok(formatted) => CommandResult::success("ask", formatted),
        Err(error @ ApplicationError::PollTimeout { .. }) => {
            CommandResult::failure("ask", "poll_timeout", error.to_string(), 5)
        }
        Err(error @ ApplicationError::Configuration(_)) => {
            CommandResult::failure("ask", "config_validation", error.to_string(), 2)
        }
        Err(error) => CommandResult::failure("ask", "backend_unavailable", error.to_string(), 4),
    }
}

async fn ask(config: &AppConfig, question: &str) -> Result<String, ApplicationError> {
    let client = GenieClient::from_config(&config.genie)?;
    let workflow =
        ConversationWorkflow::new(Arc::new(client), PollPolicy::from_config(&config.genie));
    let answer = workflow.ask(question).await?;
    Ok(render(&answer))
}

fn render(answer: &QueryAnswer) -> String {
    let rendered = format_query_answer(answer);
    match answer.sql.as_deref().map(str::trim) {
        Some(sql) if !sql.is_empty() => format!("{rendered}\n\nSQL:\n```sql\n{sql}\n```"),
        _ => rendered,
    }
}
