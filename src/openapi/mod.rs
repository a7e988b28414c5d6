use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OMC ERP Gateway",
        version = "1.0.0",
        description = r#"
# OMC ERP Gateway

Single entry point to the ERP services of an oil marketing company.

## Features

- **Financial**: chart of accounts, general ledger, journal entries, tax, fixed assets, budgets and IFRS
- **UPPF**: claim calculation, three-way delivery reconciliation, NPA batch submission and variance dashboard
- **Governance**: risk register, contracts and system configuration

## Journal entries

Journal entries are checked before they are forwarded. Debits and credits must
agree to within GHS 0.01, otherwise the request fails with `400` and nothing is
sent to the financial service.

## Caching

Reference reads (chart of accounts, trial balance, statements, tax rates and
register lists) are cached for a fixed time per operation. Writes clear the
affected entries.

## Error Handling

Errors raised by the gateway use a single format:

```json
{
  "error": "Bad Request",
  "message": "Validation error: Journal entry must balance - debits must equal credits (difference GHS 10.00)",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Errors returned by an upstream service are relayed with their original status and body.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "financial", description = "General ledger, tax, assets and reporting"),
        (name = "uppf", description = "Unified Petroleum Price Fund claims"),
        (name = "risks", description = "Risk register"),
        (name = "contracts", description = "Contract register"),
        (name = "configurations", description = "System configuration")
    ),
    paths(
        // Financial
        crate::handlers::financial::chart_of_accounts,
        crate::handlers::financial::create_account,
        crate::handlers::financial::update_account,
        crate::handlers::financial::delete_account,
        crate::handlers::financial::trial_balance,
        crate::handlers::financial::account_balance,
        crate::handlers::financial::account_movements,
        crate::handlers::financial::financial_statements,
        crate::handlers::financial::list_journal_entries,
        crate::handlers::financial::get_journal_entry,
        crate::handlers::financial::create_journal_entry,
        crate::handlers::financial::validate_journal_entry,
        crate::handlers::financial::update_journal_entry,
        crate::handlers::financial::delete_journal_entry,
        crate::handlers::financial::post_journal_entry,
        crate::handlers::financial::approve_journal_entry,
        crate::handlers::financial::reverse_journal_entry,
        crate::handlers::financial::calculate_taxes,
        crate::handlers::financial::ghana_tax_rates,
        crate::handlers::financial::submit_tax_return,
        crate::handlers::financial::fixed_assets,
        crate::handlers::financial::create_fixed_asset,
        crate::handlers::financial::calculate_depreciation,
        crate::handlers::financial::run_depreciation_schedule,
        crate::handlers::financial::budgets,
        crate::handlers::financial::create_budget,
        crate::handlers::financial::budget_variance,
        crate::handlers::financial::project_profitability,
        crate::handlers::financial::cost_allocation,
        crate::handlers::financial::ifrs_compliance,
        crate::handlers::financial::ifrs_report,
        crate::handlers::financial::health,

        // UPPF
        crate::handlers::uppf::list_claims,
        crate::handlers::uppf::get_claim,
        crate::handlers::uppf::create_claim,
        crate::handlers::uppf::update_claim,
        crate::handlers::uppf::delete_claim,
        crate::handlers::uppf::submit_claim,
        crate::handlers::uppf::approve_claim,
        crate::handlers::uppf::reject_claim,
        crate::handlers::uppf::pay_claim,
        crate::handlers::uppf::calculate,
        crate::handlers::uppf::batch_submit,
        crate::handlers::uppf::dashboard,
        crate::handlers::uppf::three_way_reconciliation,
        crate::handlers::uppf::quick_reconciliation,
        crate::handlers::uppf::list_routes,
        crate::handlers::uppf::create_route,
        crate::handlers::uppf::route_anomalies,
        crate::handlers::uppf::npa_submissions,

        // Risks
        crate::handlers::risks::list_risks,
        crate::handlers::risks::get_risk,
        crate::handlers::risks::create_risk,
        crate::handlers::risks::update_risk,
        crate::handlers::risks::delete_risk,
        crate::handlers::risks::assess_risk,

        // Contracts
        crate::handlers::contracts::list_contracts,
        crate::handlers::contracts::get_contract,
        crate::handlers::contracts::create_contract,
        crate::handlers::contracts::update_contract,
        crate::handlers::contracts::delete_contract,
        crate::handlers::contracts::renew_contract,

        // Configurations
        crate::handlers::configurations::list_configurations,
        crate::handlers::configurations::get_configuration,
        crate::handlers::configurations::create_configuration,
        crate::handlers::configurations::update_configuration,
        crate::handlers::configurations::delete_configuration,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::ledger::JournalEntry,
            crate::ledger::JournalLine,
            crate::ledger::JournalStatus,
            crate::ledger::BalanceCheck,
            crate::handlers::financial::ReverseJournalRequest,
            crate::gateway::UpstreamHealth,
            crate::gateway::HealthStatus,
            crate::uppf::ClaimCalculationRequest,
            crate::uppf::ClaimCalculation,
            crate::uppf::ThreeWayReconciliationRequest,
            crate::uppf::ReconciliationResult,
            crate::uppf::VarianceDashboard,
            crate::entities::risk::Model,
            crate::entities::contract::Model,
            crate::entities::configuration::Model,
            crate::entities::uppf_claim::Model,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
