#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use omc_erp_gateway::{
    cache::InMemoryCache,
    config::{AppConfig, UpstreamConfig},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

/// Router wired to a single wiremock server standing in for every upstream.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub upstream: MockServer,
}

impl TestApp {
    pub async fn new() -> Self {
        let upstream = MockServer::start().await;

        let mut cfg = AppConfig::new("127.0.0.1".to_string(), 18_080, "test".to_string());
        cfg.upstream = UpstreamConfig {
            financial_service_url: upstream.uri(),
            uppf_service_url: upstream.uri(),
            risk_service_url: upstream.uri(),
            contract_service_url: upstream.uri(),
            configuration_service_url: upstream.uri(),
            request_timeout_secs: 5,
        };

        let state = AppState::with_cache(cfg, Arc::new(InMemoryCache::new()))
            .expect("failed to build test state");
        let router = omc_erp_gateway::app(state.clone());

        Self {
            router,
            state,
            upstream,
        }
    }

    /// Send a request against the router, JSON-encoding `body` when present.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends the request and decodes the JSON response body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, response_json(response).await)
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}
