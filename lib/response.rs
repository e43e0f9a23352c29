use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::api_client::ApiResponse;

/// Status label used for requests that never produced an http response.
pub const REQUEST_FAILURE_STATUS: &str = "request-failure";

/// What came back for one request, minus the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDescriptor {
    Http {
        status: u16,
        url: String,
        headers: BTreeMap<String, String>,
    },
    /// Network failure, timeout or undecodable response. `headers` is already a
    /// plain value (an empty string) and is passed through as is.
    TransportFailure { headers: Value },
}

impl ResponseDescriptor {
    pub fn transport_failure() -> Self {
        Self::TransportFailure {
            headers: Value::String(String::new()),
        }
    }

    pub fn from_api_response(response: &ApiResponse) -> Self {
        Self::Http {
            status: response.status,
            url: response.url.clone(),
            headers: response.headers.clone(),
        }
    }

    /// `"200"`, `"422"`, ... or `"request-failure"`.
    pub fn status_label(&self) -> String {
        match self {
            Self::Http { status, .. } => status.to_string(),
            Self::TransportFailure { .. } => REQUEST_FAILURE_STATUS.to_string(),
        }
    }
}

/// Response paired with its decoded body.
///
/// The body is the decoded JSON document, a synthetic
/// `{message, error: true, status}` object for text responses, or the
/// stringified error for transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub response: ResponseDescriptor,
    pub body: Value,
}

impl ExecutionResult {
    pub fn new(response: ResponseDescriptor, body: Value) -> Self {
        Self { response, body }
    }

    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::new(
            ResponseDescriptor::transport_failure(),
            Value::String(message.into()),
        )
    }

    pub fn status_label(&self) -> String {
        self.response.status_label()
    }
}

/// Fully stringified projection of an [`ExecutionResult`], used for grouping
/// and logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimplifiedResult {
    pub status: String,
    pub body: String,
    pub headers: String,
}

pub fn classify(result: &ExecutionResult) -> SimplifiedResult {
    let headers = match &result.response {
        ResponseDescriptor::Http { headers, .. } => Value::Object(
            headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect::<Map<String, Value>>(),
        ),
        ResponseDescriptor::TransportFailure { headers } => headers.clone(),
    };

    SimplifiedResult {
        status: result.status_label(),
        body: result.body.to_string(),
        headers: headers.to_string(),
    }
}

pub fn simplify_results(results: &[ExecutionResult]) -> Vec<SimplifiedResult> {
    results.iter().map(classify).collect()
}
