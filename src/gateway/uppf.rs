use axum::http::HeaderMap;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use strum::Display;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::resource::{list_cache_key, LIST_TTL};
use super::{path_segment, with_query, HttpMethod, QueryParams, ServiceGateway, UpstreamHealth};
use crate::entities::uppf_claim::Model as ClaimRecord;
use crate::errors::ServiceError;
use crate::metrics::increment_counter;
use crate::uppf::{prepare_batch_submission, variance_dashboard, BatchSubmission, UppfClaimStatus, VarianceDashboard};

const CLAIMS: &str = "uppf_claims";
const ROUTES: &str = "uppf_routes";
const NPA_SUBMISSIONS: &str = "npa_submissions";

/// Upstream lifecycle endpoints under `/claims/{id}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ClaimAction {
    Submit,
    Approve,
    Reject,
    Pay,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmissionOutcome {
    #[serde(flatten)]
    pub submission: BatchSubmission,
    /// NPA submission record as stored upstream
    pub upstream: Value,
    /// Claims NPA received but the claim service did not mark as submitted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmarked_claims: Vec<String>,
}

/// Path id of a claim record: its UUID when the service sent one, else the claim number
fn upstream_claim_id(claim: &ClaimRecord) -> String {
    if claim.id.is_nil() {
        claim.claim_number.clone()
    } else {
        claim.id.to_string()
    }
}

/// Pulls claim records out of a list response, either a bare array or a
/// `{ "data": [...] }` envelope. Records that do not decode are skipped.
pub fn claim_records(response: Value) -> Vec<ClaimRecord> {
    let items = match response {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ClaimRecord>(item) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "skipping undecodable UPPF claim record");
                None
            }
        })
        .collect()
}

/// Gateway to the UPPF service (claims, routes, NPA submissions)
#[derive(Clone)]
pub struct UppfGateway {
    inner: ServiceGateway,
}

impl UppfGateway {
    pub fn new(inner: ServiceGateway) -> Self {
        Self { inner }
    }

    pub fn service(&self) -> &ServiceGateway {
        &self.inner
    }

    async fn cached_list(
        &self,
        resource: &str,
        path: &str,
        query: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = list_cache_key(resource, query)?;
        self.inner
            .cached_get(&key, LIST_TTL, &with_query(path, query), headers)
            .await
    }

    async fn clear_lists(&self, resources: &[&str]) {
        let prefixes: Vec<String> = resources.iter().map(|r| format!("{}:list:", r)).collect();
        let prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
        self.inner.cache().invalidate_prefixes(&prefixes).await;
    }

    // ---- claims ----

    pub async fn claims(
        &self,
        query: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.cached_list(CLAIMS, "/claims", query, headers).await
    }

    pub async fn claim(&self, claim_id: &str, headers: Option<&HeaderMap>) -> Result<Value, ServiceError> {
        self.inner
            .forward(&format!("/claims/{}", path_segment(claim_id)?), HttpMethod::Get, None, headers)
            .await
    }

    pub async fn create_claim(
        &self,
        claim: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward("/claims", HttpMethod::Post, Some(claim), headers)
            .await?;
        self.clear_lists(&[CLAIMS]).await;
        Ok(result)
    }

    pub async fn update_claim(
        &self,
        claim_id: &str,
        claim: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(&format!("/claims/{}", path_segment(claim_id)?), HttpMethod::Put, Some(claim), headers)
            .await?;
        self.clear_lists(&[CLAIMS]).await;
        Ok(result)
    }

    pub async fn delete_claim(
        &self,
        claim_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(&format!("/claims/{}", path_segment(claim_id)?), HttpMethod::Delete, None, headers)
            .await?;
        self.clear_lists(&[CLAIMS]).await;
        Ok(result)
    }

    /// Forwards a lifecycle step. Upstream decides whether the transition is legal.
    pub async fn transition(
        &self,
        claim_id: &str,
        action: ClaimAction,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let path = format!("/claims/{}/{}", path_segment(claim_id)?, action);
        let result = self.inner.forward(&path, HttpMethod::Post, body, headers).await?;
        info!(claim_id, %action, "UPPF claim transition forwarded");
        self.clear_lists(&[CLAIMS]).await;
        Ok(result)
    }

    /// Submits every ready claim of `window_id` to NPA as one package
    pub async fn batch_submit(
        &self,
        window_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<BatchSubmissionOutcome, ServiceError> {
        let mut query = QueryParams::new();
        query.insert("windowId".into(), window_id.to_string());
        query.insert("status".into(), UppfClaimStatus::ReadyToSubmit.to_string());

        let listed = self
            .inner
            .forward(&with_query("/claims", &query), HttpMethod::Get, None, headers)
            .await?;
        let ready = claim_records(listed);
        let now = Utc::now();
        let submission = prepare_batch_submission(window_id, &ready, now)?;

        let package = serde_json::to_value(&submission.package)?;
        let upstream = self
            .inner
            .forward("/npa/submissions", HttpMethod::Post, Some(&package), headers)
            .await?;

        increment_counter("uppf_batch_submissions_total");
        info!(
            window_id,
            reference = %submission.submission_reference,
            claims = submission.submitted_claims.len(),
            "UPPF batch submitted"
        );

        let marker = json!({
            "submissionReference": submission.submission_reference,
            "submittedAt": now,
        });
        let mut unmarked_claims = Vec::new();
        let packaged = ready
            .iter()
            .filter(|c| submission.submitted_claims.contains(&c.claim_number));
        for claim in packaged {
            let claim_id = upstream_claim_id(claim);
            if let Err(err) = self
                .transition(&claim_id, ClaimAction::Submit, Some(&marker), headers)
                .await
            {
                error!(
                    claim_id = %claim_id,
                    reference = %submission.submission_reference,
                    error = %err,
                    "claim sent to NPA but not marked submitted"
                );
                unmarked_claims.push(claim.claim_number.clone());
            }
        }
        self.clear_lists(&[CLAIMS, NPA_SUBMISSIONS]).await;

        Ok(BatchSubmissionOutcome {
            submission,
            upstream,
            unmarked_claims,
        })
    }

    /// Builds the variance dashboard from the upstream's submitted claims
    pub async fn dashboard(&self, headers: Option<&HeaderMap>) -> Result<VarianceDashboard, ServiceError> {
        let mut query = QueryParams::new();
        query.insert("submitted".into(), "true".into());
        let listed = self
            .inner
            .forward(&with_query("/claims", &query), HttpMethod::Get, None, headers)
            .await?;
        Ok(variance_dashboard(&claim_records(listed), Utc::now()))
    }

    // ---- routes and NPA ----

    pub async fn routes(
        &self,
        query: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.cached_list(ROUTES, "/routes", query, headers).await
    }

    pub async fn create_route(
        &self,
        route: &Value,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward("/routes", HttpMethod::Post, Some(route), headers)
            .await?;
        self.clear_lists(&[ROUTES]).await;
        Ok(result)
    }

    pub async fn npa_submissions(
        &self,
        query: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        self.cached_list(NPA_SUBMISSIONS, "/npa/submissions", query, headers)
            .await
    }

    pub async fn health(&self) -> UpstreamHealth {
        self.inner.health().await
    }
}
