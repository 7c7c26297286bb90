use std::process::ExitCode;

fn main() -> ExitCode {
    genie_relay_cli::run()
}
