use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;

use crate::api_client::error::ApiClientError;
use crate::api_client::{ApiResponse, DatacenterApi};
use crate::data_source::Record;

/// One scripted outcome for a mock api call.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Response(ApiResponse),
    /// Answers with the response once the delay has passed.
    Delayed(Duration, ApiResponse),
    Failure(String),
}

impl Scripted {
    async fn resolve(self) -> Result<ApiResponse, ApiClientError> {
        match self {
            Scripted::Response(response) => Ok(response),
            Scripted::Delayed(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Scripted::Failure(message) => Err(ApiClientError::ConnectError(message)),
        }
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> ApiResponse {
    let mut headers = BTreeMap::new();
    headers.insert(
        "content-type".to_string(),
        "application/json; charset=utf-8".to_string(),
    );
    ApiResponse {
        status,
        url: "http://mock.test/api/datacenters".to_string(),
        headers,
        body: body.to_string(),
    }
}

pub(crate) fn text_response(status: u16, body: &str) -> ApiResponse {
    let mut headers = BTreeMap::new();
    headers.insert(
        "content-type".to_string(),
        "text/html; charset=utf-8".to_string(),
    );
    ApiResponse {
        status,
        url: "http://mock.test/api/datacenters".to_string(),
        headers,
        body: body.to_string(),
    }
}

/// Api that replays scripted outcomes in call order and records every call.
///
/// Once the script runs out, `fallback` answers every further call; with no
/// fallback the call fails as a transport error.
#[derive(Default)]
pub(crate) struct MockApi {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    status: Option<Scripted>,
    calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn always(outcome: Scripted) -> Self {
        Self {
            fallback: Some(outcome),
            ..Self::default()
        }
    }

    pub(crate) fn with_status(mut self, outcome: Scripted) -> Self {
        self.status = Some(outcome);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn next(&self, call: String) -> Scripted {
        self.calls.lock().expect("calls mutex poisoned").push(call.clone());
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Scripted::Failure(format!("no scripted response for {call}")))
    }
}

impl DatacenterApi for MockApi {
    fn status(&self) -> BoxFuture<'_, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls mutex poisoned")
                .push("status".to_string());
            self.status
                .clone()
                .unwrap_or_else(|| Scripted::Response(text_response(200, "ok")))
                .resolve()
                .await
        })
    }

    fn create<'a>(
        &'a self,
        _record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move { self.next("create".to_string()).resolve().await })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        _record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move { self.next(format!("update {id}")).resolve().await })
    }
}
