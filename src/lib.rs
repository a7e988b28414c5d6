//! OMC ERP Gateway
//!
//! HTTP gateway in front of the ERP microservices of an oil marketing company:
//! journal balance checks, cached forwarding, UPPF claim reconciliation and the
//! risk, contract and configuration registers.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod config;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod middleware_helpers;
pub mod openapi;
pub mod tracing;
pub mod uppf;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::cache::{CacheBackend, CacheFactory};
use crate::entities::{configuration, contract, risk};
use crate::gateway::{
    FinancialGateway, HealthStatus, ResourceGateway, ResponseCache, ServiceGateway, UppfGateway,
    UpstreamClient, UpstreamHealth,
};

/// Shared handler state: one gateway per upstream, all over the same cache
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub financial: FinancialGateway,
    pub uppf: UppfGateway,
    pub risks: ResourceGateway<risk::Model>,
    pub contracts: ResourceGateway<contract::Model>,
    pub configurations: ResourceGateway<configuration::Model>,
    pub cache: ResponseCache,
}

impl AppState {
    pub fn from_config(config: config::AppConfig) -> anyhow::Result<Self> {
        let backend = CacheFactory::create_cache(&config.cache);
        Self::with_cache(config, backend)
    }

    /// Builds the gateways over a caller-provided cache backend
    pub fn with_cache(
        config: config::AppConfig,
        backend: Arc<dyn CacheBackend>,
    ) -> anyhow::Result<Self> {
        let cache = ResponseCache::new(backend);
        let upstream = &config.upstream;
        let timeout = upstream.request_timeout();
        let service = |name: &str, url: &str| -> anyhow::Result<ServiceGateway> {
            Ok(ServiceGateway::new(
                UpstreamClient::new(name, url, timeout)?,
                cache.clone(),
            ))
        };

        let financial = FinancialGateway::new(service(
            "financial-service",
            &upstream.financial_service_url,
        )?);
        let uppf = UppfGateway::new(service("uppf-service", &upstream.uppf_service_url)?);
        let risks = ResourceGateway::new(
            service("risk-service", &upstream.risk_service_url)?,
            "risks",
        );
        let contracts = ResourceGateway::new(
            service("contract-service", &upstream.contract_service_url)?,
            "contracts",
        );
        let configurations = ResourceGateway::new(
            service("configuration-service", &upstream.configuration_service_url)?,
            "configurations",
        );

        Ok(Self {
            config,
            financial,
            uppf,
            risks,
            contracts,
            configurations,
            cache,
        })
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("upstream unavailable".into())
            })
            .await;

        assert!(!response.success);
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/financial", handlers::financial::financial_routes())
        .nest("/uppf", handlers::uppf::uppf_routes())
        .nest("/risks", handlers::risks::risk_routes())
        .nest("/contracts", handlers::contracts::contract_routes())
        .nest("/configurations", handlers::configurations::configuration_routes())
}

/// Full application: API, metrics, Swagger UI and the middleware stack
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = state.config.upstream.request_timeout() + Duration::from_secs(5);

    Router::<AppState>::new()
        .route("/metrics", get(metrics_text))
        .route("/metrics/json", get(metrics_json))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn metrics_text() -> impl IntoResponse {
    match metrics::metrics_handler().await {
        Ok(body) => (StatusCode::OK, body),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("metrics error"),
        ),
    }
}

async fn metrics_json() -> impl IntoResponse {
    match metrics::metrics_json_handler().await {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "metrics error"})),
        ),
    }
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "omc-erp-gateway",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

/// Pings every upstream concurrently; always answers 200 with per-service status
async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let checks: Vec<UpstreamHealth> = join_all([
        state.financial.service().health(),
        state.uppf.service().health(),
        state.risks.service().health(),
        state.contracts.service().health(),
        state.configurations.service().health(),
    ])
    .await;

    let all_healthy = checks.iter().all(|c| c.status == HealthStatus::Healthy);
    let health_data = json!({
        "status": if all_healthy { "healthy" } else { "degraded" },
        "checks": checks,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
