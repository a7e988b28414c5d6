use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;

use crate::{
    entities::risk, errors::ServiceError, gateway::QueryParams, ApiResponse, ApiResult, AppState,
};

fn require_title(risk: &risk::Model) -> Result<(), ServiceError> {
    if risk.risk_title.trim().is_empty() {
        return Err(ServiceError::ValidationError("riskTitle is required".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/risks",
    params(
        ("status" = Option<String>, Query, description = "Filter by risk status"),
        ("category" = Option<String>, Query, description = "Filter by risk category")
    ),
    responses((status = 200, description = "Risk register", body = ApiResponse<serde_json::Value>)),
    tag = "risks"
)]
pub async fn list_risks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.risks.list(&query, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/risks/{id}",
    params(("id" = String, Path, description = "Risk ID")),
    responses(
        (status = 200, description = "Risk", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Unknown risk", body = crate::errors::ErrorResponse)
    ),
    tag = "risks"
)]
pub async fn get_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.risks.get(&id, Some(&headers)).await?,
    )))
}

/// Scores, level, flags and risk code are derived before the record is forwarded.
#[utoipa::path(
    post,
    path = "/api/v1/risks",
    request_body = risk::Model,
    responses(
        (status = 200, description = "Risk registered", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid risk", body = crate::errors::ErrorResponse)
    ),
    tag = "risks"
)]
pub async fn create_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(risk): Json<risk::Model>,
) -> ApiResult<Value> {
    require_title(&risk)?;
    Ok(Json(ApiResponse::success(
        state.risks.create(risk, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/risks/{id}",
    params(("id" = String, Path, description = "Risk ID")),
    request_body = risk::Model,
    responses((status = 200, description = "Risk replaced", body = ApiResponse<serde_json::Value>)),
    tag = "risks"
)]
pub async fn update_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(risk): Json<risk::Model>,
) -> ApiResult<Value> {
    require_title(&risk)?;
    Ok(Json(ApiResponse::success(
        state.risks.update(&id, risk, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/risks/{id}",
    params(("id" = String, Path, description = "Risk ID")),
    responses((status = 200, description = "Risk deleted", body = ApiResponse<serde_json::Value>)),
    tag = "risks"
)]
pub async fn delete_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.risks.delete(&id, Some(&headers)).await?,
    )))
}

/// Returns the risk with its derived fields filled in; nothing is forwarded.
#[utoipa::path(
    post,
    path = "/api/v1/risks/assess",
    request_body = risk::Model,
    responses((status = 200, description = "Assessed risk", body = ApiResponse<risk::Model>)),
    tag = "risks"
)]
pub async fn assess_risk(
    State(state): State<AppState>,
    Json(risk): Json<risk::Model>,
) -> ApiResult<risk::Model> {
    Ok(Json(ApiResponse::success(state.risks.derive(risk))))
}

pub fn risk_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_risks).post(create_risk))
        .route("/assess", post(assess_risk))
        .route("/:id", get(get_risk).put(update_risk).delete(delete_risk))
}
