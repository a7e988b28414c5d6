mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use omc_erp_gateway::{cache::InMemoryCache, config::AppConfig, AppState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn chart_of_accounts_is_served_from_cache() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/chart-of-accounts"))
        .and(query_param("accountType", "ASSET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"code": "1000", "name": "Cash"}])),
        )
        .expect(1)
        .mount(&app.upstream)
        .await;

    for _ in 0..3 {
        let (status, body) = app
            .json(
                Method::GET,
                "/api/v1/financial/chart-of-accounts?accountType=ASSET",
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["code"], "1000");
    }
}

#[tokio::test]
async fn account_changes_invalidate_chart_of_accounts() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/chart-of-accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/chart-of-accounts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"code": "1400"})))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let uri = "/api/v1/financial/chart-of-accounts";
    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);
    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);

    let (status, body) = app
        .json(
            Method::POST,
            uri,
            Some(json!({"code": "1400", "name": "Prepaid expenses", "type": "ASSET"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "1400");

    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn failed_reads_are_not_cached() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/tax-management/ghana-rates"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "maintenance"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tax-management/ghana-rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vat": 0.15, "nhil": 0.025})))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let uri = "/api/v1/financial/tax/ghana-rates";
    let (status, body) = app.json(Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "maintenance");

    let (status, body) = app.json(Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vat"], 0.15);

    // third read is a cache hit
    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn risk_list_cache_is_cleared_by_create() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/risks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "total": 0})))
        .expect(2)
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/risks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "r-1"})))
        .mount(&app.upstream)
        .await;

    let uri = "/api/v1/risks?page=1";
    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);
    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/risks",
            Some(json!({"riskTitle": "Depot fire", "likelihoodScore": 2, "impactScore": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.json(Method::GET, uri, None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    let mut cfg = AppConfig::new("127.0.0.1".into(), 18_081, "test".into());
    // nothing listens on the discard port
    cfg.upstream.financial_service_url = "http://127.0.0.1:9".into();
    cfg.upstream.request_timeout_secs = 2;
    let state = AppState::with_cache(cfg, Arc::new(InMemoryCache::new())).unwrap();
    let router = omc_erp_gateway::app(state);

    let response = router
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/v1/financial/chart-of-accounts")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Gateway");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("External service error"));
}

#[tokio::test]
async fn request_id_is_propagated_upstream() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/journal-entries/je-11"))
        .and(wiremock::matchers::header("x-request-id", "trace-me-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "je-11"})))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/financial/journal-entries/je-11",
            None,
            &[("x-request-id", "trace-me-1")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me-1"
    );
}

#[tokio::test]
async fn health_reports_degraded_when_an_upstream_is_down() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.upstream)
        .await;

    let (status, body) = app.json(Method::GET, "/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["checks"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["checks"][0]["status"], "unhealthy");
}
