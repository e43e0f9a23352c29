pub mod error;
pub mod retry;

use log::{debug, info};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::api_client::error::ApiClientError;
use crate::api_client::{ApiResponse, DatacenterApi};
use crate::data_source::Record;
use crate::response::{ExecutionResult, ResponseDescriptor};
use error::RequestError;
pub use retry::RetryPolicy;
use retry::send_with_retry;

/// Which api call a batch performs for each of its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiAction {
    /// `create(record)`
    Create,
    /// `update(record.id, record)`; the record must carry an id.
    Update,
}

impl ApiAction {
    pub fn name(&self) -> &'static str {
        match self {
            ApiAction::Create => "create",
            ApiAction::Update => "update",
        }
    }
}

impl fmt::Display for ApiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiAction {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(ApiAction::Create),
            "update" => Ok(ApiAction::Update),
            _ => Err(RequestError::UnsupportedAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Turn transport failures into a synthetic `request-failure` result
    /// instead of returning the error.
    pub suppress_errors: bool,
    /// Log every response/body pair. Could get noisy.
    pub log_response: bool,
    pub retry_policy: RetryPolicy,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            suppress_errors: true,
            log_response: false,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Arguments for one api call, resolved from the action and the record.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestArgs<'a> {
    Create(&'a Record),
    Update(String, &'a Record),
}

impl<'a> RequestArgs<'a> {
    /// An update for a record without an id is a contract violation.
    pub fn resolve(record: &'a Record, action: ApiAction) -> Result<Self, RequestError> {
        match action {
            ApiAction::Create => Ok(RequestArgs::Create(record)),
            ApiAction::Update => record
                .id()
                .map(|id| RequestArgs::Update(id, record))
                .ok_or_else(|| RequestError::InvalidArgument("must have id to update".into())),
        }
    }

    async fn call<A>(&self, api: &A) -> Result<ApiResponse, ApiClientError>
    where
        A: DatacenterApi + ?Sized,
    {
        match self {
            RequestArgs::Create(record) => api.create(record).await,
            RequestArgs::Update(id, record) => api.update(id, record).await,
        }
    }
}

/// Performs `action` for one record and decodes the response.
///
/// JSON responses are decoded as is. Anything else (429s and 404s from this
/// api are plain text) becomes `{message, error: true, status}`. Transport
/// failures become a `request-failure` result when `suppress_errors` is set;
/// argument errors always propagate. `slot` is the record's position in its
/// batch and only spreads retry jitter.
pub async fn perform<A>(
    api: &A,
    record: &Record,
    slot: usize,
    action: ApiAction,
    options: &RequestOptions,
) -> Result<ExecutionResult, RequestError>
where
    A: DatacenterApi + ?Sized,
{
    let args = RequestArgs::resolve(record, action)?;

    let result = send(api, &args, &options.retry_policy, jitter_key(slot, record))
        .await
        .and_then(|response| decode(&response));

    let result = match result {
        Ok(result) => result,
        Err(err) if options.suppress_errors && err.is_suppressible() => {
            debug!("{} request failed, suppressing: {}", action, err);
            ExecutionResult::transport_failure(render_error(&err))
        }
        Err(err) => return Err(err),
    };

    if options.log_response {
        info!(
            "{} - response and body: {:?} {}",
            action, result.response, result.body
        );
    }
    Ok(result)
}

async fn send<A>(
    api: &A,
    args: &RequestArgs<'_>,
    policy: &RetryPolicy,
    jitter_key: u64,
) -> Result<ApiResponse, RequestError>
where
    A: DatacenterApi + ?Sized,
{
    let response = send_with_retry(policy, jitter_key, |attempt| async move {
        if attempt > 1 {
            debug!("Retrying request, attempt {}", attempt);
        }
        args.call(api).await
    })
    .await?;
    Ok(response)
}

fn decode(response: &ApiResponse) -> Result<ExecutionResult, RequestError> {
    let body = if response.is_json() {
        serde_json::from_str::<Value>(&response.body).map_err(|source| {
            RequestError::MalformedBody {
                url: response.url.clone(),
                source,
            }
        })?
    } else {
        json!({
            "message": response.body,
            "error": true,
            "status": response.status,
        })
    };
    Ok(ExecutionResult::new(
        ResponseDescriptor::from_api_response(response),
        body,
    ))
}

fn render_error(err: &RequestError) -> String {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.contains(&cause_text) {
            rendered.push('\n');
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}

fn jitter_key(slot: usize, record: &Record) -> u64 {
    let mut hasher = DefaultHasher::new();
    (slot, record.id()).hash(&mut hasher);
    hasher.finish()
}
