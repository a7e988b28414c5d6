//! Request forwarding to the upstream ERP microservices.
//!
//! Each upstream is reached through an [`UpstreamClient`]; reads that are safe
//! to reuse go through a [`ResponseCache`] with a fixed TTL per operation.

pub mod financial;
pub mod resource;
pub mod uppf;

use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::http::HeaderMap;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::cache::CacheBackend;
use crate::errors::ServiceError;
use crate::metrics::GATEWAY_METRICS;
use crate::middleware_helpers::request_id::REQUEST_ID_HEADER;

pub use financial::FinancialGateway;
pub use resource::ResourceGateway;
pub use uppf::UppfGateway;

/// Inbound headers copied onto upstream requests
const FORWARDED_HEADERS: [&str; 4] = ["authorization", "x-tenant-id", "x-user-id", "accept-language"];

/// Query string parameters, kept ordered so cache keys are stable
pub type QueryParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parses a verb name, rejecting anything outside GET/POST/PUT/PATCH/DELETE
    pub fn parse(method: &str) -> Result<Self, ServiceError> {
        HttpMethod::from_str(method)
            .map_err(|_| ServiceError::BadRequest(format!("Unsupported HTTP method: {}", method)))
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// Appends `params` to `path` as a query string, skipping empty values
pub fn with_query(path: &str, params: &QueryParams) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
        serializer.append_pair(key, value);
    }
    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

/// Encodes a caller-supplied id as exactly one upstream path segment.
///
/// `/`, `%`, `?`, `#` and spaces are percent-encoded so an id can never climb
/// out of the resource it names. Empty and dot-only ids are rejected.
pub fn path_segment(id: &str) -> Result<String, ServiceError> {
    if id.trim().is_empty() || id == "." || id == ".." {
        return Err(ServiceError::BadRequest(format!("Invalid resource id: {:?}", id)));
    }
    let mut url = url::Url::parse("http://upstream/")
        .map_err(|err| ServiceError::InternalError(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::InternalError("upstream base cannot carry path segments".into()))?
        .pop_if_empty()
        .push(id);
    Ok(url.path().trim_start_matches('/').to_string())
}

/// HTTP client bound to one upstream service
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    service: String,
    base_url: String,
    client: Client,
}

impl UpstreamClient {
    /// Build a client with its own reqwest pool and request timeout.
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let service = service.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| format!("failed to construct reqwest client for {}", service))?;

        Ok(Self::with_client(service, base_url, client))
    }

    /// Build from an existing client (useful for testing).
    pub fn with_client(service: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `method path` upstream and returns the decoded JSON body.
    ///
    /// Non-2xx answers come back as [`ServiceError::Upstream`] carrying the
    /// original status and body; transport failures as `ExternalServiceError`.
    /// Either way the failure is logged here and returned unchanged.
    pub async fn forward(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.as_reqwest(), &url);

        if let Some(headers) = headers {
            for name in FORWARDED_HEADERS {
                if let Some(value) = headers.get(name) {
                    request = request.header(name, value.clone());
                }
            }
        }
        if let Some(request_id) = crate::tracing::current_request_id() {
            request = request.header(REQUEST_ID_HEADER, request_id.as_str());
        }
        if method.carries_body() {
            if let Some(body) = body {
                request = request.json(body);
            }
        }

        debug!(service = %self.service, %method, path, "forwarding upstream request");
        let started = Instant::now();
        let result = self.dispatch(request).await;
        GATEWAY_METRICS.record_upstream(started.elapsed(), result.is_err());

        result.map_err(|err| {
            match &err {
                ServiceError::Upstream { status, body } => error!(
                    service = %self.service,
                    %method,
                    path,
                    status,
                    response = %body,
                    "Upstream request failed"
                ),
                other => error!(
                    service = %self.service,
                    %method,
                    path,
                    error = %other,
                    "Upstream request failed"
                ),
            }
            err
        })
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<Value, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = decode_body(&text);

        if status.is_success() {
            Ok(body)
        } else {
            Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Probes `GET /health`; never fails, reports `unhealthy` instead
    pub async fn health(&self) -> UpstreamHealth {
        let timestamp = chrono::Utc::now().to_rfc3339();
        match self.forward("/health", HttpMethod::Get, None, None).await {
            Ok(details) => UpstreamHealth {
                status: HealthStatus::Healthy,
                service: self.service.clone(),
                timestamp,
                details: Some(details),
                error: None,
            },
            Err(err) => UpstreamHealth {
                status: HealthStatus::Unhealthy,
                service: self.service.clone(),
                timestamp,
                details: None,
                error: Some(err.to_string()),
            },
        }
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpstreamHealth {
    pub status: HealthStatus,
    pub service: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// TTL cache over upstream JSON responses
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Returns the cached value under `key`, or runs `fetch` and caches its result for `ttl`.
    ///
    /// Cache faults are logged and treated as misses; only `fetch` errors reach the caller.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Value, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ServiceError>>,
    {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    GATEWAY_METRICS.cache_hits.inc();
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(err) => warn!(key, error = %err, "discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(err) => warn!(key, error = %err, "cache read failed"),
        }

        GATEWAY_METRICS.cache_misses.inc();
        let value = fetch().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self.backend.set(key, &raw, Some(ttl)).await {
                    warn!(key, error = %err, "cache write failed");
                }
            }
            Err(err) => warn!(key, error = %err, "response not cacheable"),
        }
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(err) = self.backend.delete(key).await {
            warn!(key, error = %err, "cache delete failed");
        }
    }

    /// Drops every entry under each prefix
    pub async fn invalidate_prefixes(&self, prefixes: &[&str]) {
        for prefix in prefixes {
            match self.backend.delete_prefix(prefix).await {
                Ok(removed) => debug!(prefix, removed, "cache prefix invalidated"),
                Err(err) => warn!(prefix, error = %err, "cache prefix invalidation failed"),
            }
        }
    }
}

/// An upstream client paired with the shared response cache
#[derive(Clone)]
pub struct ServiceGateway {
    upstream: Arc<UpstreamClient>,
    cache: ResponseCache,
}

impl ServiceGateway {
    pub fn new(upstream: UpstreamClient, cache: ResponseCache) -> Self {
        Self {
            upstream: Arc::new(upstream),
            cache,
        }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn forward(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.upstream.forward(path, method, body, headers).await
    }

    /// GET through the cache
    pub async fn cached_get(
        &self,
        key: &str,
        ttl: Duration,
        path: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.cache
            .get_or_fetch(key, ttl, || {
                self.upstream.forward(path, HttpMethod::Get, None, headers)
            })
            .await
    }

    pub async fn health(&self) -> UpstreamHealth {
        self.upstream.health().await
    }
}
