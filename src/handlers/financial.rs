use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    errors::ServiceError,
    gateway::{HealthStatus, QueryParams, UpstreamHealth},
    ledger::{one_sided_violations, BalanceCheck, JournalEntry},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrialBalanceQuery {
    pub period_id: String,
    /// Balance date, `YYYY-MM-DD`
    pub as_of_date: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatementQuery {
    pub period_id: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    pub period_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AsOfQuery {
    pub as_of_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaxRatesQuery {
    /// VAT, NHIL, GETFUND, COVID or WITHHOLDING; all rates when absent
    pub tax_type: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BudgetQuery {
    pub fiscal_year: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"reason": "Posted to wrong cost centre"}))]
pub struct ReverseJournalRequest {
    #[validate(length(min = 1, message = "a reversal reason is required"))]
    pub reason: String,
}

/// `{"method": "STRAIGHT_LINE", "usefulLifeYears": 10}`; fields besides
/// `method` are forwarded as depreciation parameters.
#[derive(Debug, Deserialize)]
pub struct DepreciationRequest {
    pub method: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn ok(value: Value) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(value)))
}

// ---- chart of accounts ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/chart-of-accounts",
    params(("accountType" = Option<String>, Query, description = "ASSET, LIABILITY, EQUITY, REVENUE or EXPENSE")),
    responses(
        (status = 200, description = "Chart of accounts", body = ApiResponse<serde_json::Value>),
        (status = 502, description = "Financial service unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "financial"
)]
pub async fn chart_of_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filters): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.financial.chart_of_accounts(&filters, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/chart-of-accounts",
    request_body = serde_json::Value,
    responses((status = 200, description = "Account created", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(account): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.create_account(&account, Some(&headers)).await?)
}

#[utoipa::path(
    put,
    path = "/api/v1/financial/chart-of-accounts/{id}",
    params(("id" = String, Path, description = "Account ID")),
    request_body = serde_json::Value,
    responses((status = 200, description = "Account updated", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn update_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(account): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.update_account(&id, &account, Some(&headers)).await?)
}

#[utoipa::path(
    delete,
    path = "/api/v1/financial/chart-of-accounts/{id}",
    params(("id" = String, Path, description = "Account ID")),
    responses((status = 200, description = "Account deleted", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.delete_account(&id, Some(&headers)).await?)
}

// ---- general ledger ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/general-ledger/trial-balance",
    params(TrialBalanceQuery),
    responses((status = 200, description = "Trial balance", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn trial_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TrialBalanceQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .trial_balance(&query.period_id, &query.as_of_date, Some(&headers))
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/general-ledger/account-balance/{code}",
    params(("code" = String, Path, description = "Account code"), AsOfQuery),
    responses((status = 200, description = "Account balance", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn account_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .account_balance(&code, query.as_of_date.as_deref(), Some(&headers))
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/general-ledger/account-movements/{code}",
    params(("code" = String, Path, description = "Account code"), DateRangeQuery),
    responses((status = 200, description = "Account movements", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn account_movements(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .account_movements(
            &code,
            range.from_date.as_deref(),
            range.to_date.as_deref(),
            Some(&headers),
        )
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/financial-statements/{type}",
    params(
        ("type" = String, Path, description = "balance-sheet, income-statement, cash-flow or equity-changes"),
        StatementQuery
    ),
    responses((status = 200, description = "Financial statement", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn financial_statements(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(statement_type): Path<String>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .financial_statements(&query.period_id, &statement_type, Some(&headers))
        .await?)
}

// ---- journal entries ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/journal-entries",
    responses((status = 200, description = "Journal entries", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn list_journal_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filters): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.financial.journal_entries(&filters, Some(&headers)).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/journal-entries/{id}",
    params(("id" = String, Path, description = "Journal entry ID")),
    responses(
        (status = 200, description = "Journal entry", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Unknown journal entry", body = crate::errors::ErrorResponse)
    ),
    tag = "financial"
)]
pub async fn get_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.journal_entry(&id, Some(&headers)).await?)
}

fn warn_on_two_sided_lines(entry: &JournalEntry) {
    let lines = one_sided_violations(&entry.lines);
    if !lines.is_empty() {
        warn!(reference = %entry.reference, ?lines, "journal lines should carry exactly one of debit or credit");
    }
}

/// Unbalanced entries are rejected with 400 before any upstream call.
#[utoipa::path(
    post,
    path = "/api/v1/financial/journal-entries",
    request_body = JournalEntry,
    responses(
        (status = 200, description = "Journal entry created", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Entry does not balance", body = crate::errors::ErrorResponse)
    ),
    tag = "financial"
)]
pub async fn create_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entry): Json<JournalEntry>,
) -> ApiResult<Value> {
    entry.validate()?;
    warn_on_two_sided_lines(&entry);
    ok(state.financial.create_journal_entry(&entry, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/journal-entries/validate",
    request_body = JournalEntry,
    responses((status = 200, description = "Debit and credit totals", body = ApiResponse<BalanceCheck>)),
    tag = "financial"
)]
pub async fn validate_journal_entry(Json(entry): Json<JournalEntry>) -> ApiResult<BalanceCheck> {
    Ok(Json(ApiResponse::success(entry.balance()?)))
}

#[utoipa::path(
    put,
    path = "/api/v1/financial/journal-entries/{id}",
    params(("id" = String, Path, description = "Journal entry ID")),
    request_body = JournalEntry,
    responses(
        (status = 200, description = "Journal entry updated", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Entry does not balance", body = crate::errors::ErrorResponse)
    ),
    tag = "financial"
)]
pub async fn update_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(entry): Json<JournalEntry>,
) -> ApiResult<Value> {
    entry.validate()?;
    warn_on_two_sided_lines(&entry);
    ok(state
        .financial
        .update_journal_entry(&id, &entry, Some(&headers))
        .await?)
}

#[utoipa::path(
    delete,
    path = "/api/v1/financial/journal-entries/{id}",
    params(("id" = String, Path, description = "Journal entry ID")),
    responses((status = 200, description = "Journal entry deleted", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn delete_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.delete_journal_entry(&id, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/journal-entries/{id}/post",
    params(("id" = String, Path, description = "Journal entry ID")),
    responses((status = 200, description = "Journal entry posted", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn post_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.post_journal_entry(&id, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/journal-entries/{id}/approve",
    params(("id" = String, Path, description = "Journal entry ID")),
    responses((status = 200, description = "Journal entry approved", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn approve_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.approve_journal_entry(&id, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/journal-entries/{id}/reverse",
    params(("id" = String, Path, description = "Journal entry ID")),
    request_body = ReverseJournalRequest,
    responses((status = 200, description = "Reversal created", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn reverse_journal_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<ReverseJournalRequest>,
) -> ApiResult<Value> {
    request.validate()?;
    ok(state
        .financial
        .reverse_journal_entry(&id, &request.reason, Some(&headers))
        .await?)
}

// ---- tax ----

#[utoipa::path(
    post,
    path = "/api/v1/financial/tax/calculate",
    request_body = serde_json::Value,
    responses((status = 200, description = "Tax breakdown", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn calculate_taxes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.calculate_taxes(&request, Some(&headers)).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/tax/ghana-rates",
    params(TaxRatesQuery),
    responses((status = 200, description = "Current Ghana tax rates", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn ghana_tax_rates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TaxRatesQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .ghana_tax_rates(query.tax_type.as_deref(), Some(&headers))
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/tax/returns",
    request_body = serde_json::Value,
    responses((status = 200, description = "Tax return submitted", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn submit_tax_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(tax_return): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.submit_tax_return(&tax_return, Some(&headers)).await?)
}

// ---- fixed assets ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/fixed-assets",
    responses((status = 200, description = "Fixed asset register", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn fixed_assets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filters): Query<QueryParams>,
) -> ApiResult<Value> {
    ok(state.financial.fixed_assets(&filters, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/fixed-assets",
    request_body = serde_json::Value,
    responses((status = 200, description = "Fixed asset registered", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn create_fixed_asset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(asset): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.create_fixed_asset(&asset, Some(&headers)).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/fixed-assets/{id}/depreciation",
    params(("id" = String, Path, description = "Asset ID")),
    request_body = serde_json::Value,
    responses((status = 200, description = "Depreciation calculated", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn calculate_depreciation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<DepreciationRequest>,
) -> ApiResult<Value> {
    if request.method.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "depreciation method is required".to_string(),
        ));
    }
    let params = Value::Object(request.params);
    ok(state
        .financial
        .calculate_depreciation(&id, &request.method, &params, Some(&headers))
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/fixed-assets/depreciation/run/{period}",
    params(("period" = String, Path, description = "Accounting period ID")),
    responses((status = 200, description = "Depreciation run completed", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn run_depreciation_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(period): Path<String>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .run_depreciation_schedule(&period, Some(&headers))
        .await?)
}

// ---- budgets, projects, cost centres ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/budgets",
    params(BudgetQuery),
    responses((status = 200, description = "Budgets", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn budgets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BudgetQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .budgets(
            query.fiscal_year.as_deref(),
            query.department_id.as_deref(),
            Some(&headers),
        )
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/financial/budgets",
    request_body = serde_json::Value,
    responses((status = 200, description = "Budget created", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn create_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(budget): Json<Value>,
) -> ApiResult<Value> {
    ok(state.financial.create_budget(&budget, Some(&headers)).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/budgets/{id}/variance",
    params(("id" = String, Path, description = "Budget ID"), PeriodQuery),
    responses((status = 200, description = "Budget variance analysis", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn budget_variance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .budget_variance(&id, query.period_id.as_deref(), Some(&headers))
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/projects/{id}/profitability",
    params(("id" = String, Path, description = "Project ID"), DateRangeQuery),
    responses((status = 200, description = "Project profitability", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn project_profitability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .project_profitability(
            &id,
            range.from_date.as_deref(),
            range.to_date.as_deref(),
            Some(&headers),
        )
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/cost-centers/{id}/allocation",
    params(("id" = String, Path, description = "Cost centre ID"), PeriodQuery),
    responses((status = 200, description = "Cost allocation", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn cost_allocation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .cost_allocation(&id, query.period_id.as_deref(), Some(&headers))
        .await?)
}

// ---- IFRS ----

#[utoipa::path(
    get,
    path = "/api/v1/financial/ifrs/{period}",
    params(("period" = String, Path, description = "Accounting period ID")),
    responses((status = 200, description = "IFRS compliance status", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn ifrs_compliance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(period): Path<String>,
) -> ApiResult<Value> {
    ok(state.financial.ifrs_compliance(&period, Some(&headers)).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/ifrs/reports/{type}",
    params(("type" = String, Path, description = "IFRS report type"), StatementQuery),
    responses((status = 200, description = "IFRS report", body = ApiResponse<serde_json::Value>)),
    tag = "financial"
)]
pub async fn ifrs_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(report_type): Path<String>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<Value> {
    ok(state
        .financial
        .generate_ifrs_report(&report_type, &query.period_id, Some(&headers))
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/financial/health",
    responses((status = 200, description = "Financial service health", body = ApiResponse<UpstreamHealth>)),
    tag = "financial"
)]
pub async fn health(State(state): State<AppState>) -> ApiResult<UpstreamHealth> {
    let health = state.financial.health().await;
    if health.status == HealthStatus::Unhealthy {
        warn!(service = %health.service, "financial service reported unhealthy");
    }
    Ok(Json(ApiResponse::success(health)))
}

pub fn financial_routes() -> Router<AppState> {
    Router::new()
        .route("/chart-of-accounts", get(chart_of_accounts).post(create_account))
        .route("/chart-of-accounts/:id", put(update_account).delete(delete_account))
        .route("/general-ledger/trial-balance", get(trial_balance))
        .route("/general-ledger/account-balance/:code", get(account_balance))
        .route("/general-ledger/account-movements/:code", get(account_movements))
        .route("/financial-statements/:statement_type", get(financial_statements))
        .route("/journal-entries", get(list_journal_entries).post(create_journal_entry))
        .route("/journal-entries/validate", post(validate_journal_entry))
        .route(
            "/journal-entries/:id",
            get(get_journal_entry)
                .put(update_journal_entry)
                .delete(delete_journal_entry),
        )
        .route("/journal-entries/:id/post", post(post_journal_entry))
        .route("/journal-entries/:id/approve", post(approve_journal_entry))
        .route("/journal-entries/:id/reverse", post(reverse_journal_entry))
        .route("/tax/calculate", post(calculate_taxes))
        .route("/tax/ghana-rates", get(ghana_tax_rates))
        .route("/tax/returns", post(submit_tax_return))
        .route("/fixed-assets", get(fixed_assets).post(create_fixed_asset))
        .route("/fixed-assets/:id/depreciation", post(calculate_depreciation))
        .route(
            "/fixed-assets/depreciation/run/:period",
            post(run_depreciation_schedule),
        )
        .route("/budgets", get(budgets).post(create_budget))
        .route("/budgets/:id/variance", get(budget_variance))
        .route("/projects/:id/profitability", get(project_profitability))
        .route("/cost-centers/:id/allocation", get(cost_allocation))
        .route("/ifrs/:period", get(ifrs_compliance))
        .route("/ifrs/reports/:report_type", get(ifrs_report))
        .route("/health", get(health))
}
