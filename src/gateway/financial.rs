use std::time::Duration;

use axum::http::HeaderMap;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{path_segment, with_query, HttpMethod, QueryParams, ServiceGateway, UpstreamHealth};
use crate::errors::ServiceError;
use crate::ledger::JournalEntry;
use crate::metrics::GATEWAY_METRICS;

/// Cache lifetimes per financial read
pub mod ttl {
    use std::time::Duration;

    pub const CHART_OF_ACCOUNTS: Duration = Duration::from_secs(5 * 60);
    pub const TRIAL_BALANCE: Duration = Duration::from_secs(10 * 60);
    pub const FINANCIAL_STATEMENTS: Duration = Duration::from_secs(30 * 60);
    pub const ACCOUNT_BALANCE: Duration = Duration::from_secs(5 * 60);
    pub const JOURNAL_ENTRY: Duration = Duration::from_secs(10 * 60);
    pub const GHANA_TAX_RATES: Duration = Duration::from_secs(60 * 60);
    pub const BUDGET_VARIANCE: Duration = Duration::from_secs(10 * 60);
    pub const PROJECT_PROFITABILITY: Duration = Duration::from_secs(15 * 60);
    pub const COST_ALLOCATION: Duration = Duration::from_secs(10 * 60);
    pub const IFRS_COMPLIANCE: Duration = Duration::from_secs(30 * 60);
}

const ACCOUNT_CACHE_PREFIXES: &[&str] = &["coa:", "account_balance:"];
const FINANCIAL_CACHE_PREFIXES: &[&str] = &[
    "trial_balance:",
    "financial_statements:",
    "account_balance:",
    "budget_variance:",
    "project_profitability:",
    "cost_allocation:",
    "ifrs_compliance:",
];

fn or_current(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("current")
}

fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> QueryParams {
    pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
        .collect()
}

/// Gateway to the financial service (GL, tax, assets, budgets, IFRS)
#[derive(Clone)]
pub struct FinancialGateway {
    inner: ServiceGateway,
}

impl FinancialGateway {
    pub fn new(inner: ServiceGateway) -> Self {
        Self { inner }
    }

    pub fn service(&self) -> &ServiceGateway {
        &self.inner
    }

    // ---- chart of accounts ----

    pub async fn chart_of_accounts(
        &self,
        filters: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("coa:{}", serde_json::to_string(filters)?);
        self.inner
            .cached_get(
                &key,
                ttl::CHART_OF_ACCOUNTS,
                &with_query("/chart-of-accounts", filters),
                headers,
            )
            .await
    }

    pub async fn create_account(
        &self,
        account: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward("/chart-of-accounts", HttpMethod::Post, Some(account), headers)
            .await?;
        self.clear_account_caches().await;
        Ok(result)
    }

    pub async fn update_account(
        &self,
        account_id: &str,
        account: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/chart-of-accounts/{}", path_segment(account_id)?),
                HttpMethod::Put,
                Some(account),
                headers,
            )
            .await?;
        self.clear_account_caches().await;
        Ok(result)
    }

    pub async fn delete_account(
        &self,
        account_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/chart-of-accounts/{}", path_segment(account_id)?),
                HttpMethod::Delete,
                None,
                headers,
            )
            .await?;
        self.clear_account_caches().await;
        Ok(result)
    }

    // ---- general ledger ----

    pub async fn trial_balance(
        &self,
        period_id: &str,
        as_of_date: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("trial_balance:{}:{}", period_id, as_of_date);
        let path = with_query(
            "/general-ledger/trial-balance",
            &params([("periodId", Some(period_id)), ("asOfDate", Some(as_of_date))]),
        );
        self.inner
            .cached_get(&key, ttl::TRIAL_BALANCE, &path, headers)
            .await
    }

    pub async fn financial_statements(
        &self,
        period_id: &str,
        statement_type: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("financial_statements:{}:{}", period_id, statement_type);
        let path = with_query(
            &format!("/financial-reporting/{}", path_segment(statement_type)?),
            &params([("periodId", Some(period_id))]),
        );
        self.inner
            .cached_get(&key, ttl::FINANCIAL_STATEMENTS, &path, headers)
            .await
    }

    pub async fn account_balance(
        &self,
        account_code: &str,
        as_of_date: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("account_balance:{}:{}", account_code, or_current(as_of_date));
        let path = with_query(
            &format!("/general-ledger/account-balance/{}", path_segment(account_code)?),
            &params([("asOfDate", as_of_date)]),
        );
        self.inner
            .cached_get(&key, ttl::ACCOUNT_BALANCE, &path, headers)
            .await
    }

    pub async fn account_movements(
        &self,
        account_code: &str,
        from_date: Option<&str>,
        to_date: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let path = with_query(
            &format!("/general-ledger/account-movements/{}", path_segment(account_code)?),
            &params([("fromDate", from_date), ("toDate", to_date)]),
        );
        self.inner
            .forward(&path, HttpMethod::Get, None, headers)
            .await
    }

    // ---- journal entries ----

    pub async fn journal_entries(
        &self,
        filters: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward(
                &with_query("/journal-entries", filters),
                HttpMethod::Get,
                None,
                headers,
            )
            .await
    }

    pub async fn journal_entry(
        &self,
        journal_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .cached_get(
                &journal_entry_key(journal_id),
                ttl::JOURNAL_ENTRY,
                &format!("/journal-entries/{}", path_segment(journal_id)?),
                headers,
            )
            .await
    }

    /// Forwards a new entry only after it balances; unbalanced entries never leave the gateway.
    pub async fn create_journal_entry(
        &self,
        entry: &JournalEntry,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.ensure_balanced(entry)?;
        let payload = serde_json::to_value(entry)?;
        let result = self
            .inner
            .forward("/journal-entries", HttpMethod::Post, Some(&payload), headers)
            .await?;
        self.clear_financial_caches().await;
        Ok(result)
    }

    pub async fn update_journal_entry(
        &self,
        journal_id: &str,
        entry: &JournalEntry,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.ensure_balanced(entry)?;
        let payload = serde_json::to_value(entry)?;
        let result = self
            .inner
            .forward(
                &format!("/journal-entries/{}", path_segment(journal_id)?),
                HttpMethod::Put,
                Some(&payload),
                headers,
            )
            .await?;
        self.after_journal_change(journal_id).await;
        Ok(result)
    }

    pub async fn delete_journal_entry(
        &self,
        journal_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/journal-entries/{}", path_segment(journal_id)?),
                HttpMethod::Delete,
                None,
                headers,
            )
            .await?;
        self.after_journal_change(journal_id).await;
        Ok(result)
    }

    pub async fn post_journal_entry(
        &self,
        journal_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/journal-entries/{}/post", path_segment(journal_id)?),
                HttpMethod::Post,
                None,
                headers,
            )
            .await?;
        self.after_journal_change(journal_id).await;
        Ok(result)
    }

    pub async fn approve_journal_entry(
        &self,
        journal_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/journal-entries/{}/approve", path_segment(journal_id)?),
                HttpMethod::Patch,
                None,
                headers,
            )
            .await?;
        self.inner.cache().invalidate(&journal_entry_key(journal_id)).await;
        Ok(result)
    }

    pub async fn reverse_journal_entry(
        &self,
        journal_id: &str,
        reason: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/journal-entries/{}/reverse", path_segment(journal_id)?),
                HttpMethod::Post,
                Some(&json!({ "reason": reason })),
                headers,
            )
            .await?;
        self.after_journal_change(journal_id).await;
        Ok(result)
    }

    fn ensure_balanced(&self, entry: &JournalEntry) -> Result<(), ServiceError> {
        entry
            .ensure_balanced()
            .map(|_| ())
            .map_err(|err| {
                GATEWAY_METRICS.journal_entries_rejected.inc();
                info!(reference = %entry.reference, "rejected unbalanced journal entry");
                err
            })
    }

    // ---- tax ----

    pub async fn calculate_taxes(
        &self,
        request: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward("/tax-management/calculate", HttpMethod::Post, Some(request), headers)
            .await
    }

    pub async fn ghana_tax_rates(
        &self,
        tax_type: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!(
            "ghana_tax_rates:{}",
            tax_type.filter(|t| !t.is_empty()).unwrap_or("all")
        );
        let path = with_query(
            "/tax-management/ghana-rates",
            &params([("taxType", tax_type)]),
        );
        self.inner
            .cached_get(&key, ttl::GHANA_TAX_RATES, &path, headers)
            .await
    }

    pub async fn submit_tax_return(
        &self,
        tax_return: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward("/tax-management/returns", HttpMethod::Post, Some(tax_return), headers)
            .await
    }

    // ---- fixed assets ----

    pub async fn fixed_assets(
        &self,
        filters: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward(&with_query("/fixed-assets", filters), HttpMethod::Get, None, headers)
            .await
    }

    pub async fn create_fixed_asset(
        &self,
        asset: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward("/fixed-assets", HttpMethod::Post, Some(asset), headers)
            .await
    }

    /// `params` is merged into the body next to `method`
    pub async fn calculate_depreciation(
        &self,
        asset_id: &str,
        method: &str,
        params: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let mut body = json!({ "method": method });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), params.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        self.inner
            .forward(
                &format!("/fixed-assets/{}/depreciation", path_segment(asset_id)?),
                HttpMethod::Post,
                Some(&body),
                headers,
            )
            .await
    }

    pub async fn run_depreciation_schedule(
        &self,
        period_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(
                &format!("/fixed-assets/depreciation/run/{}", path_segment(period_id)?),
                HttpMethod::Post,
                None,
                headers,
            )
            .await?;
        self.clear_financial_caches().await;
        Ok(result)
    }

    // ---- budgets, projects, cost centres ----

    pub async fn budgets(
        &self,
        fiscal_year: Option<&str>,
        department_id: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let path = with_query(
            "/budget-management/budgets",
            &params([("fiscalYear", fiscal_year), ("departmentId", department_id)]),
        );
        self.inner
            .forward(&path, HttpMethod::Get, None, headers)
            .await
    }

    pub async fn create_budget(
        &self,
        budget: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .forward("/budget-management/budgets", HttpMethod::Post, Some(budget), headers)
            .await
    }

    pub async fn budget_variance(
        &self,
        budget_id: &str,
        period_id: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("budget_variance:{}:{}", budget_id, or_current(period_id));
        let path = with_query(
            &format!("/budget-management/variance-analysis/{}", path_segment(budget_id)?),
            &params([("periodId", period_id)]),
        );
        self.inner
            .cached_get(&key, ttl::BUDGET_VARIANCE, &path, headers)
            .await
    }

    pub async fn project_profitability(
        &self,
        project_id: &str,
        from_date: Option<&str>,
        to_date: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!(
            "project_profitability:{}:{}:{}",
            project_id,
            from_date.unwrap_or(""),
            to_date.unwrap_or("")
        );
        let path = with_query(
            &format!("/project-accounting/profitability/{}", path_segment(project_id)?),
            &params([("fromDate", from_date), ("toDate", to_date)]),
        );
        self.inner
            .cached_get(&key, ttl::PROJECT_PROFITABILITY, &path, headers)
            .await
    }

    pub async fn cost_allocation(
        &self,
        cost_center_id: &str,
        period_id: Option<&str>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = format!("cost_allocation:{}:{}", cost_center_id, or_current(period_id));
        let path = with_query(
            &format!("/cost-management/allocation/{}", path_segment(cost_center_id)?),
            &params([("periodId", period_id)]),
        );
        self.inner
            .cached_get(&key, ttl::COST_ALLOCATION, &path, headers)
            .await
    }

    // ---- IFRS ----

    pub async fn ifrs_compliance(
        &self,
        period_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.inner
            .cached_get(
                &format!("ifrs_compliance:{}", period_id),
                ttl::IFRS_COMPLIANCE,
                &format!("/ifrs-compliance/{}", path_segment(period_id)?),
                headers,
            )
            .await
    }

    pub async fn generate_ifrs_report(
        &self,
        report_type: &str,
        period_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let path = with_query(
            &format!("/ifrs-compliance/reports/{}", path_segment(report_type)?),
            &params([("periodId", Some(period_id))]),
        );
        self.inner
            .forward(&path, HttpMethod::Get, None, headers)
            .await
    }

    pub async fn health(&self) -> UpstreamHealth {
        self.inner.health().await
    }

    // ---- cache invalidation ----

    async fn clear_account_caches(&self) {
        debug!("Clearing account-related caches");
        self.inner
            .cache()
            .invalidate_prefixes(ACCOUNT_CACHE_PREFIXES)
            .await;
    }

    async fn clear_financial_caches(&self) {
        debug!("Clearing financial-related caches");
        self.inner
            .cache()
            .invalidate_prefixes(FINANCIAL_CACHE_PREFIXES)
            .await;
    }

    async fn after_journal_change(&self, journal_id: &str) {
        self.clear_financial_caches().await;
        self.inner.cache().invalidate(&journal_entry_key(journal_id)).await;
    }
}

fn journal_entry_key(journal_id: &str) -> String {
    format!("journal_entry:{}", journal_id)
}

/// Expose the TTL for a cache key prefix, mostly for diagnostics
pub fn ttl_for_key(key: &str) -> Option<Duration> {
    let prefix = key.split(':').next()?;
    let ttl = match prefix {
        "coa" => ttl::CHART_OF_ACCOUNTS,
        "trial_balance" => ttl::TRIAL_BALANCE,
        "financial_statements" => ttl::FINANCIAL_STATEMENTS,
        "account_balance" => ttl::ACCOUNT_BALANCE,
        "journal_entry" => ttl::JOURNAL_ENTRY,
        "ghana_tax_rates" => ttl::GHANA_TAX_RATES,
        "budget_variance" => ttl::BUDGET_VARIANCE,
        "project_profitability" => ttl::PROJECT_PROFITABILITY,
        "cost_allocation" => ttl::COST_ALLOCATION,
        "ifrs_compliance" => ttl::IFRS_COMPLIANCE,
        _ => return None,
    };
    Some(ttl)
}
