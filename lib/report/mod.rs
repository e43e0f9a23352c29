use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use yansi::Paint;

use crate::response::{ExecutionResult, ResponseDescriptor};

pub type ResponseCounts = BTreeMap<String, usize>;

/// Normalized error message to number of occurrences.
pub type ErrorSummary = BTreeMap<String, usize>;

/// Status the api uses for schema validation failures.
pub const VALIDATION_STATUS: u16 = 422;

/// Sums counts per key across all inputs.
pub fn combine_counts(counts: &[ResponseCounts]) -> ResponseCounts {
    counts.iter().fold(ResponseCounts::new(), |mut acc, count| {
        for (key, value) in count {
            *acc.entry(key.clone()).or_insert(0) += value;
        }
        acc
    })
}

/// Histogram of error messages across results.
///
/// Counts bodies that are plain strings (transport failures) or carry a truthy
/// `error` flag. Structured errors are keyed `"{status} - {message}"`; plain
/// strings have `api_host` and stray `undefined` lines stripped.
pub fn create_error_summary(results: &[ExecutionResult], api_host: &str) -> ErrorSummary {
    results
        .iter()
        .filter_map(|result| error_message(&result.body, api_host))
        .fold(ErrorSummary::new(), |mut acc, message| {
            *acc.entry(message).or_insert(0) += 1;
            acc
        })
}

fn error_message(body: &Value, api_host: &str) -> Option<String> {
    match body {
        Value::String(text) => {
            let mut message = text.replace("\nundefined", "");
            if !api_host.is_empty() {
                message = message.replace(api_host, "");
            }
            Some(message)
        }
        Value::Object(fields) if fields.get("error").map(is_truthy).unwrap_or(false) => {
            Some(format!(
                "{} - {}",
                render(fields.get("status")),
                render(fields.get("message"))
            ))
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// One 422 response: the body's fields plus where and how it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub url: String,
    pub status: u16,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ValidationFailure {
    /// Entries of the body's `messages` list, if it had one.
    pub fn messages(&self) -> Vec<String> {
        match self.details.get("messages") {
            Some(Value::Array(items)) => items.iter().map(|m| render(Some(m))).collect(),
            _ => Vec::new(),
        }
    }
}

pub fn create_validation_summary(results: &[ExecutionResult]) -> Vec<ValidationFailure> {
    results
        .iter()
        .filter_map(|result| match &result.response {
            ResponseDescriptor::Http { status, url, .. } if *status == VALIDATION_STATUS => {
                let mut details = match &result.body {
                    Value::Object(fields) => fields.clone(),
                    _ => Map::new(),
                };
                details.remove("url");
                details.remove("status");
                Some(ValidationFailure {
                    url: url.clone(),
                    status: *status,
                    details,
                })
            }
            _ => None,
        })
        .collect()
}

pub fn log_response_counts(counts: &ResponseCounts) {
    info!("{}", "HTTP Status Codes".underline());
    for (status, count) in counts {
        info!("{}: {}", status, count.green());
    }
}

pub fn log_error_summary(summary: &ErrorSummary) {
    info!("{}", "Error Summary".underline());
    for (message, count) in summary {
        info!("{} [occurred {} time(s)]", message.red(), count.green());
    }
}

pub fn log_validation_summary(summary: &[ValidationFailure]) {
    info!("{}", "Validation Summary".underline());
    for failure in summary {
        info!("{}", format!("({}) {}", failure.status, failure.url).green());
        for message in failure.messages() {
            info!("       |---- {}", message.yellow());
        }
    }
}
