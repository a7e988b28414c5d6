use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;

use crate::{
    entities::contract, errors::ServiceError, gateway::QueryParams, ApiResponse, ApiResult,
    AppState,
};

fn validate_contract(contract: &contract::Model) -> Result<(), ServiceError> {
    if contract.contract_title.trim().is_empty() {
        return Err(ServiceError::ValidationError("contractTitle is required".to_string()));
    }
    if contract.counterparty_name.trim().is_empty() {
        return Err(ServiceError::ValidationError("counterpartyName is required".to_string()));
    }
    if let (Some(from), Some(to)) = (contract.effective_date, contract.expiry_date) {
        if to < from {
            return Err(ServiceError::ValidationError(
                "expiryDate must not precede effectiveDate".to_string(),
            ));
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/contracts",
    responses((status = 200, description = "Contracts", body = ApiResponse<serde_json::Value>)),
    tag = "contracts"
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.contracts.list(&query, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}",
    params(("id" = String, Path, description = "Contract ID")),
    responses((status = 200, description = "Contract", body = ApiResponse<serde_json::Value>)),
    tag = "contracts"
)]
pub async fn get_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.contracts.get(&id, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/contracts",
    request_body = contract::Model,
    responses(
        (status = 200, description = "Contract created", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid contract", body = crate::errors::ErrorResponse)
    ),
    tag = "contracts"
)]
pub async fn create_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(contract): Json<contract::Model>,
) -> ApiResult<Value> {
    validate_contract(&contract)?;
    Ok(Json(ApiResponse::success(
        state.contracts.create(contract, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/contracts/{id}",
    params(("id" = String, Path, description = "Contract ID")),
    request_body = contract::Model,
    responses((status = 200, description = "Contract replaced", body = ApiResponse<serde_json::Value>)),
    tag = "contracts"
)]
pub async fn update_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(contract): Json<contract::Model>,
) -> ApiResult<Value> {
    validate_contract(&contract)?;
    Ok(Json(ApiResponse::success(
        state.contracts.update(&id, contract, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/contracts/{id}",
    params(("id" = String, Path, description = "Contract ID")),
    responses((status = 200, description = "Contract deleted", body = ApiResponse<serde_json::Value>)),
    tag = "contracts"
)]
pub async fn delete_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(
        state.contracts.delete(&id, Some(&headers)).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/contracts/{id}/renew",
    params(("id" = String, Path, description = "Contract ID")),
    request_body = serde_json::Value,
    responses((status = 200, description = "Renewal recorded", body = ApiResponse<serde_json::Value>)),
    tag = "contracts"
)]
pub async fn renew_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let body = body.map(|Json(value)| value);
    Ok(Json(ApiResponse::success(
        state
            .contracts
            .action(&id, "renew", body.as_ref(), Some(&headers))
            .await?,
    )))
}

pub fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contracts).post(create_contract))
        .route(
            "/:id",
            get(get_contract).put(update_contract).delete(delete_contract),
        )
        .route("/:id/renew", post(renew_contract))
}
