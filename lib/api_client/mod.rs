pub mod error;

use futures::future::BoxFuture;
use log::debug;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data_source::Record;
use error::ApiClientError;

const RESOURCE_NAME: &str = "datacenters";

/// Fully read http response.
///
/// The body is buffered so callers can decide between JSON and text after the
/// fact, and so scripted responses can stand in for the network in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub url: String,
    /// Lowercased header names. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE.as_str()).map(String::as_str)
    }

    /// Naive content-type sniff, anything mentioning json counts.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }

    async fn read(response: reqwest::Response) -> Result<Self, ApiClientError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = headers_to_map(response.headers());
        let body = response.text().await?;
        Ok(Self {
            status,
            url,
            headers,
            body,
        })
    }
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

/// Remote datacenter api.
///
/// This trait exists so batch and import logic can be tested against scripted
/// responses without network access.
pub trait DatacenterApi: Send + Sync {
    /// Liveness check, `GET {base}/status`.
    fn status(&self) -> BoxFuture<'_, Result<ApiResponse, ApiClientError>>;

    /// `POST {base}/datacenters`
    fn create<'a>(&'a self, record: &'a Record)
        -> BoxFuture<'a, Result<ApiResponse, ApiClientError>>;

    /// `PUT {base}/datacenters/{id}`
    fn update<'a>(
        &'a self,
        id: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>>;
}

impl<T> DatacenterApi for Arc<T>
where
    T: DatacenterApi + ?Sized,
{
    fn status(&self) -> BoxFuture<'_, Result<ApiResponse, ApiClientError>> {
        (**self).status()
    }

    fn create<'a>(
        &'a self,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        (**self).create(record)
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        (**self).update(id, record)
    }
}

/// reqwest-backed client used by the binaries.
///
/// Retries are not handled here; see `request::RetryPolicy`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ApiClientError::ConnectError(format!("invalid api url {base_url}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scheme and authority of the base url, e.g. `https://example.com`.
    pub fn host(&self) -> String {
        match reqwest::Url::parse(&self.base_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.base_url.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, ApiClientError> {
        let response = request.send().await?;
        let response = ApiResponse::read(response).await?;
        debug!("{} -> {}", response.url, response.status);
        Ok(response)
    }
}

impl DatacenterApi for ApiClient {
    fn status(&self) -> BoxFuture<'_, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move { self.send(self.client.get(self.endpoint("status"))).await })
    }

    fn create<'a>(
        &'a self,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move {
            let request = self.client.post(self.endpoint(RESOURCE_NAME)).json(record);
            self.send(request).await
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<ApiResponse, ApiClientError>> {
        Box::pin(async move {
            let path = format!("{RESOURCE_NAME}/{id}");
            let request = self.client.put(self.endpoint(&path)).json(record);
            self.send(request).await
        })
    }
}
