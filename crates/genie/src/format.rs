//! Rendering of Genie answers as Slack-ready text.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::{AnswerContent, QueryAnswer};

pub const PARSE_FAILURE_PREFIX: &str = "⚠️ Could not parse result:";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected a JSON object or string, got {0}")]
    UnexpectedShape(&'static str),
    #[error("manifest has no column list")]
    MissingColumns,
    #[error("column {0} has no name")]
    UnnamedColumn(usize),
    #[error("result has no row list")]
    MissingRows,
    #[error("row {0} is not a list of values")]
    MalformedRow(usize),
    #[error("payload has neither a manifest nor text content")]
    MissingContent,
}

pub fn format_answer(content: &AnswerContent) -> String {
    match content {
        AnswerContent::Payload(payload) => format_payload(payload),
        AnswerContent::Unavailable { status, reason } => {
            format!("⚠️ No answer available (status: {status}): {reason}")
        }
    }
}

/// The rendered content, led by the backend's description of the generated query.
pub fn format_query_answer(answer: &QueryAnswer) -> String {
    let rendered = format_answer(&answer.content);
    match answer.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => format!("_{description}_\n{rendered}"),
        _ => rendered,
    }
}

/// Never fails: a payload that does not match the expected shapes becomes a visible
/// placeholder and the cause is logged.
pub fn format_payload(payload: &Value) -> String {
    match render_payload(payload) {
        Ok(rendered) => rendered,
        Err(error) => {
            warn!(
                event_name = "genie.format.failed",
                error = %error,
                "query result could not be rendered"
            );
            format!("{PARSE_FAILURE_PREFIX} {error}")
        }
    }
}

pub fn render_payload(payload: &Value) -> Result<String, FormatError> {
    let fields = match payload {
        Value::Object(fields) => fields,
        Value::String(text) => return Ok(code_block(text)),
        other => return Err(FormatError::UnexpectedShape(kind(other))),
    };

    match fields.get("manifest") {
        Some(Value::Null) | None => {}
        Some(manifest) => {
            let columns = column_names(manifest)?;
            let rows = row_values(payload)?;
            return Ok(code_block(&render_table(&columns, &rows)));
        }
    }

    match fields.get("content") {
        Some(Value::String(text)) => Ok(code_block(text)),
        _ => Err(FormatError::MissingContent),
    }
}

/// Header, a divider of dashes sized to each column name, then one line per row.
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(columns.join(" | "));
    lines.push(
        columns.iter().map(|name| "-".repeat(name.chars().count().max(1))).collect::<Vec<_>>().join("|"),
    );
    for row in rows {
        lines.push(row.join(" | "));
    }
    lines.join("\n")
}

fn column_names(manifest: &Value) -> Result<Vec<String>, FormatError> {
    let columns = manifest
        .get("columns")
        .or_else(|| manifest.get("schema").and_then(|schema| schema.get("columns")))
        .and_then(Value::as_array)
        .ok_or(FormatError::MissingColumns)?;

    columns
        .iter()
        .enumerate()
        .map(|(index, column)| match column {
            Value::String(name) => Ok(name.clone()),
            Value::Object(fields) => fields
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(FormatError::UnnamedColumn(index)),
            _ => Err(FormatError::UnnamedColumn(index)),
        })
        .collect()
}

fn row_values(payload: &Value) -> Result<Vec<Vec<String>>, FormatError> {
    let rows = payload
        .get("rows")
        .or_else(|| payload.get("data_array"))
        .or_else(|| payload.get("result").and_then(|result| result.get("data_array")));

    let rows = match rows {
        Some(Value::Array(rows)) => rows,
        // An empty result set comes back without a data array.
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(_) => return Err(FormatError::MissingRows),
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            row.as_array()
                .map(|values| values.iter().map(cell_text).collect())
                .ok_or(FormatError::MalformedRow(index))
        })
        .collect()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "NULL".to_owned(),
        other => other.to_string(),
    }
}

fn code_block(text: &str) -> String {
    format!("```\n{text}\n```")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
