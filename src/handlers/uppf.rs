use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::{
    gateway::{
        uppf::{BatchSubmissionOutcome, ClaimAction},
        QueryParams,
    },
    uppf::{
        calculate_claim, detect_route_anomalies, quick_reconcile, reconcile, ClaimCalculation,
        ClaimCalculationRequest, QuickReconciliation, ReconciliationResult, RouteAnomalyReport,
        RouteAnomalyRequest, ThreeWayReconciliationRequest, VarianceDashboard,
    },
    ApiResponse, ApiResult, AppState,
};

fn ok(value: Value) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(value)))
}

// ---- claims ----

#[utoipa::path(
    get,
    path = "/api/v1/uppf/claims",
    responses((status = 200, description = "UPPF claims", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn list_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.uppf.claims(&query, Some(&headers)).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/uppf/claims/{id}",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "UPPF claim", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn get_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.uppf.claim(&id, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims",
    request_body = serde_json::Value,
    responses((status = 200, description = "Claim created", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn create_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(claim): Json<Value>,
) -> ApiResult<Value> {
    ok(state.uppf.create_claim(&claim, Some(&headers)).await?)
}

#[utoipa::path(
    put,
    path = "/api/v1/uppf/claims/{id}",
    params(("id" = String, Path, description = "Claim ID")),
    request_body = serde_json::Value,
    responses((status = 200, description = "Claim updated", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn update_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(claim): Json<Value>,
) -> ApiResult<Value> {
    ok(state.uppf.update_claim(&id, &claim, Some(&headers)).await?)
}

#[utoipa::path(
    delete,
    path = "/api/v1/uppf/claims/{id}",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "Claim deleted", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn delete_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.uppf.delete_claim(&id, Some(&headers)).await?)
}

async fn forward_transition(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    action: ClaimAction,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let body = body.map(|Json(value)| value);
    ok(state
        .uppf
        .transition(id, action, body.as_ref(), Some(headers))
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/{id}/submit",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "Claim submitted", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn submit_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    forward_transition(&state, &headers, &id, ClaimAction::Submit, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/{id}/approve",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "Claim approved", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn approve_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    forward_transition(&state, &headers, &id, ClaimAction::Approve, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/{id}/reject",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "Claim rejected", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn reject_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    forward_transition(&state, &headers, &id, ClaimAction::Reject, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/{id}/pay",
    params(("id" = String, Path, description = "Claim ID")),
    responses((status = 200, description = "Payment recorded", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn pay_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    forward_transition(&state, &headers, &id, ClaimAction::Pay, body).await
}

/// Computes a claim locally; nothing is stored.
#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/calculate",
    request_body = ClaimCalculationRequest,
    responses(
        (status = 200, description = "Claim amount and status", body = ApiResponse<ClaimCalculation>),
        (status = 400, description = "Distance within equalisation threshold", body = crate::errors::ErrorResponse)
    ),
    tag = "uppf"
)]
pub async fn calculate(Json(request): Json<ClaimCalculationRequest>) -> ApiResult<ClaimCalculation> {
    let claim = calculate_claim(&request, Utc::now())?;
    Ok(Json(ApiResponse::success(claim)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/claims/batch-submit/{window}",
    params(("window" = String, Path, description = "Pricing window ID")),
    responses(
        (status = 200, description = "Claims submitted to NPA", body = ApiResponse<BatchSubmissionOutcome>),
        (status = 400, description = "No ready claims in the window", body = crate::errors::ErrorResponse)
    ),
    tag = "uppf"
)]
pub async fn batch_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(window): Path<String>,
) -> ApiResult<BatchSubmissionOutcome> {
    let outcome = state.uppf.batch_submit(&window, Some(&headers)).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/uppf/claims/dashboard",
    responses((status = 200, description = "Expected versus paid UPPF", body = ApiResponse<VarianceDashboard>)),
    tag = "uppf"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<VarianceDashboard> {
    let dashboard = state.uppf.dashboard(Some(&headers)).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

// ---- reconciliation ----

#[utoipa::path(
    post,
    path = "/api/v1/uppf/reconciliation/three-way",
    request_body = ThreeWayReconciliationRequest,
    responses(
        (status = 200, description = "Depot, transporter and station records compared", body = ApiResponse<ReconciliationResult>),
        (status = 400, description = "Invalid delivery records", body = crate::errors::ErrorResponse)
    ),
    tag = "uppf"
)]
pub async fn three_way_reconciliation(
    Json(request): Json<ThreeWayReconciliationRequest>,
) -> ApiResult<ReconciliationResult> {
    let result = reconcile(&request)?;
    info!(
        consignment_id = %request.consignment_id,
        status = ?result.status,
        "three-way reconciliation completed"
    );
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/reconciliation/quick",
    request_body = ClaimCalculationRequest,
    responses((status = 200, description = "Volume and distance variances", body = ApiResponse<QuickReconciliation>)),
    tag = "uppf"
)]
pub async fn quick_reconciliation(
    Json(request): Json<ClaimCalculationRequest>,
) -> ApiResult<QuickReconciliation> {
    Ok(Json(ApiResponse::success(quick_reconcile(&request))))
}

// ---- routes and NPA ----

#[utoipa::path(
    get,
    path = "/api/v1/uppf/routes",
    responses((status = 200, description = "Equalisation routes", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn list_routes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.uppf.routes(&query, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/routes",
    request_body = serde_json::Value,
    responses((status = 200, description = "Route created", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn create_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(route): Json<Value>,
) -> ApiResult<Value> {
    ok(state.uppf.create_route(&route, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/uppf/routes/anomalies",
    request_body = RouteAnomalyRequest,
    responses((status = 200, description = "GPS trace anomalies", body = ApiResponse<RouteAnomalyReport>)),
    tag = "uppf"
)]
pub async fn route_anomalies(
    Json(request): Json<RouteAnomalyRequest>,
) -> ApiResult<RouteAnomalyReport> {
    Ok(Json(ApiResponse::success(detect_route_anomalies(
        &request.gps_trace,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/uppf/npa/submissions",
    responses((status = 200, description = "NPA submissions", body = ApiResponse<serde_json::Value>)),
    tag = "uppf"
)]
pub async fn npa_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.uppf.npa_submissions(&query, Some(&headers)).await?)
}

pub fn uppf_routes() -> Router<AppState> {
    Router::new()
        .route("/claims", get(list_claims).post(create_claim))
        .route("/claims/calculate", post(calculate))
        .route("/claims/dashboard", get(dashboard))
        .route("/claims/batch-submit/:window", post(batch_submit))
        .route(
            "/claims/:id",
            get(get_claim).put(update_claim).delete(delete_claim),
        )
        .route("/claims/:id/submit", post(submit_claim))
        .route("/claims/:id/approve", post(approve_claim))
        .route("/claims/:id/reject", post(reject_claim))
        .route("/claims/:id/pay", post(pay_claim))
        .route("/reconciliation/three-way", post(three_way_reconciliation))
        .route("/reconciliation/quick", post(quick_reconciliation))
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/anomalies", post(route_anomalies))
        .route("/npa/submissions", get(npa_submissions))
}
