use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::{
    entities::configuration, errors::ServiceError, gateway::QueryParams, ApiResponse, ApiResult,
    AppState,
};

fn validate_configuration(config: &configuration::Model) -> Result<(), ServiceError> {
    if config.key.trim().is_empty() {
        return Err(ServiceError::ValidationError("configuration key is required".to_string()));
    }
    if config.module.trim().is_empty() {
        return Err(ServiceError::ValidationError("module is required".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/configurations",
    params(
        ("module" = Option<String>, Query, description = "Filter by owning module"),
        ("type" = Option<String>, Query, description = "SYSTEM, TENANT, MODULE, USER or FEATURE_FLAG")
    ),
    responses((status = 200, description = "Configuration entries", body = ApiResponse<serde_json::Value>)),
    tag = "configurations"
)]
pub async fn list_configurations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.configurations.list(&query, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/configurations/{id}",
    params(("id" = String, Path, description = "Configuration ID")),
    responses((status = 200, description = "Configuration entry", body = ApiResponse<serde_json::Value>)),
    tag = "configurations"
)]
pub async fn get_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.configurations.get(&id, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/configurations",
    request_body = configuration::Model,
    responses(
        (status = 200, description = "Configuration created", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid configuration", body = crate::errors::ErrorResponse)
    ),
    tag = "configurations"
)]
pub async fn create_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<configuration::Model>,
) -> ApiResult<Value> {
    validate_configuration(&config)?;
    Ok(Json(ApiResponse::success(
        state.configurations.create(config, Some(&headers)).await?,
    )))
}

/// Full replacement. The caller sends the previous value and version it read;
/// the version bump happens here when the value changed.
#[utoipa::path(
    put,
    path = "/api/v1/configurations/{id}",
    params(("id" = String, Path, description = "Configuration ID")),
    request_body = configuration::Model,
    responses((status = 200, description = "Configuration replaced", body = ApiResponse<serde_json::Value>)),
    tag = "configurations"
)]
pub async fn update_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(config): Json<configuration::Model>,
) -> ApiResult<Value> {
    validate_configuration(&config)?;
    Ok(Json(ApiResponse::success(
        state
            .configurations
            .update(&id, config, Some(&headers))
            .await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/configurations/{id}",
    params(("id" = String, Path, description = "Configuration ID")),
    responses((status = 200, description = "Configuration deleted", body = ApiResponse<serde_json::Value>)),
    tag = "configurations"
)]
pub async fn delete_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.configurations.delete(&id, Some(&headers)).await?,
    )))
}

pub fn configuration_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_configurations).post(create_configuration))
        .route(
            "/:id",
            get(get_configuration)
                .put(update_configuration)
                .delete(delete_configuration),
        )
}
