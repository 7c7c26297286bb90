use std::time::Duration;

use genie_relay_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_signing_secret(&config));
            checks.push(check_genie_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "slack_signing_secret",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "genie_reachability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_signing_secret(config: &AppConfig) -> DoctorCheck {
    let secret = config.slack.signing_secret.expose_secret();
    let looks_like_slack = secret.len() == 32 && secret.chars().all(|c| c.is_ascii_hexdigit());
    DoctorCheck {
        name: "slack_signing_secret",
        status: CheckStatus::Pass,
        details: if looks_like_slack {
            "signing secret present".to_string()
        } else {
            "signing secret present but not 32 hex characters; verify it was copied from Basic Information".to_string()
        },
    }
}

/// Any HTTP answer below 500 proves the workspace is reachable; auth is exercised by `ask`.
fn check_genie_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "genie_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.genie.request_timeout_secs))
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;

        let response = client
            .get(&config.genie.base_url)
            .bearer_auth(config.genie.token.expose_secret())
            .send()
            .await
            .map_err(|error| format!("failed to reach `{}`: {error}", config.genie.base_url))?;

        Ok::<u16, String>(response.status().as_u16())
    });

    match result {
        Ok(status) if status < 500 => DoctorCheck {
            name: "genie_reachability",
            status: CheckStatus::Pass,
            details: format!("`{}` answered HTTP {status}", config.genie.base_url),
        },
        Ok(status) => DoctorCheck {
            name: "genie_reachability",
            status: CheckStatus::Fail,
            details: format!("`{}` answered HTTP {status}", config.genie.base_url),
        },
        Err(error) => {
            DoctorCheck { name: "genie_reachability", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
