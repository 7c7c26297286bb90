pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "genie-relay-cli",
    about = "genie-relay operator CLI",
    long_about = "Inspect configuration, check backend readiness, ask questions from the terminal, and sign test requests.",
    after_help = "Examples:\n  genie-relay-cli doctor --json\n  genie-relay-cli config\n  genie-relay-cli ask \"top 5 customers by revenue\"\n  genie-relay-cli sign 'user_name=ana&text=hi&response_url=https%3A%2F%2Fexample.com'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, signing secret readiness, and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Ask the data assistant a question and print the formatted answer")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "Question text")]
        question: Vec<String>,
    },
    #[command(about = "Compute Slack signature headers for a form-encoded request body")]
    Sign {
        #[arg(long, help = "Unix timestamp to sign with (defaults to now)")]
        timestamp: Option<i64>,
        #[arg(help = "Raw form-encoded request body")]
        body: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { question } => commands::ask::run(&question.join(" ")),
        Command::Sign { timestamp, body } => commands::sign::run(timestamp, &body),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
