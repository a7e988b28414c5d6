use std::marker::PhantomData;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{path_segment, with_query, HttpMethod, QueryParams, ServiceGateway, UpstreamHealth};
use crate::entities::DerivedFields;
use crate::errors::ServiceError;

/// How long list responses stay cached
pub const LIST_TTL: Duration = Duration::from_secs(5 * 60);

/// List cache key for a resource and its query
pub fn list_cache_key(resource: &str, query: &QueryParams) -> Result<String, ServiceError> {
    Ok(format!("{}:list:{}", resource, serde_json::to_string(query)?))
}

/// CRUD passthrough for one upstream collection whose records carry derived
/// fields. Writes run `calculate_fields` before forwarding so upstream stores
/// the same values a local save would have produced.
pub struct ResourceGateway<M> {
    inner: ServiceGateway,
    resource: &'static str,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for ResourceGateway<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resource: self.resource,
            _model: PhantomData,
        }
    }
}

impl<M> ResourceGateway<M>
where
    M: DerivedFields + Serialize + DeserializeOwned,
{
    pub fn new(inner: ServiceGateway, resource: &'static str) -> Self {
        Self {
            inner,
            resource,
            _model: PhantomData,
        }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn service(&self) -> &ServiceGateway {
        &self.inner
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.resource)
    }

    fn item_path(&self, id: &str) -> Result<String, ServiceError> {
        Ok(format!("/{}/{}", self.resource, path_segment(id)?))
    }

    /// Applies the derived-field rules without touching upstream
    pub fn derive(&self, mut model: M) -> M {
        model.calculate_fields(Utc::now());
        model
    }

    pub async fn list(
        &self,
        query: &QueryParams,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let key = list_cache_key(self.resource, query)?;
        self.inner
            .cached_get(&key, LIST_TTL, &with_query(&self.collection_path(), query), headers)
            .await
    }

    pub async fn get(&self, id: &str, headers: Option<&HeaderMap>) -> Result<Value, ServiceError> {
        self.inner
            .forward(&self.item_path(id)?, HttpMethod::Get, None, headers)
            .await
    }

    pub async fn create(&self, model: M, headers: Option<&HeaderMap>) -> Result<Value, ServiceError> {
        let body = serde_json::to_value(self.derive(model))?;
        let result = self
            .inner
            .forward(&self.collection_path(), HttpMethod::Post, Some(&body), headers)
            .await?;
        self.invalidate_lists().await;
        Ok(result)
    }

    /// Full replacement of the record at `id`
    pub async fn update(
        &self,
        id: &str,
        model: M,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let body = serde_json::to_value(self.derive(model))?;
        let result = self
            .inner
            .forward(&self.item_path(id)?, HttpMethod::Put, Some(&body), headers)
            .await?;
        self.invalidate_lists().await;
        Ok(result)
    }

    pub async fn delete(&self, id: &str, headers: Option<&HeaderMap>) -> Result<Value, ServiceError> {
        let result = self
            .inner
            .forward(&self.item_path(id)?, HttpMethod::Delete, None, headers)
            .await?;
        self.invalidate_lists().await;
        Ok(result)
    }

    /// `POST /{resource}/{id}/{action}`
    pub async fn action(
        &self,
        id: &str,
        action: &str,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, ServiceError> {
        let path = format!("{}/{}", self.item_path(id)?, path_segment(action)?);
        let result = self.inner.forward(&path, HttpMethod::Post, body, headers).await?;
        self.invalidate_lists().await;
        Ok(result)
    }

    pub async fn invalidate_lists(&self) {
        let prefix = format!("{}:list:", self.resource);
        self.inner.cache().invalidate_prefixes(&[prefix.as_str()]).await;
    }

    pub async fn health(&self) -> UpstreamHealth {
        self.inner.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::entities::risk;
    use crate::gateway::{ResponseCache, UpstreamClient};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn risks(server: &MockServer) -> ResourceGateway<risk::Model> {
        let upstream =
            UpstreamClient::new("risk-service", server.uri(), Duration::from_secs(5)).unwrap();
        let cache = ResponseCache::new(Arc::new(InMemoryCache::new()));
        ResourceGateway::new(ServiceGateway::new(upstream, cache), "risks")
    }

    #[test]
    fn list_keys_include_query() {
        let mut query = QueryParams::new();
        query.insert("status".into(), "ASSESSED".into());
        assert_eq!(
            list_cache_key("risks", &query).unwrap(),
            r#"risks:list:{"status":"ASSESSED"}"#
        );
    }

    #[tokio::test]
    async fn create_sends_derived_fields_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/risks"))
            .and(body_partial_json(json!({
                "likelihoodScore": 4,
                "impactScore": 5,
                "inherentRiskScore": 20,
                "inherentRiskLevel": "CRITICAL",
                "isCritical": true,
                "boardReportable": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let model = risk::Model {
            risk_title: "Product contamination at depot".into(),
            likelihood: risk::RiskLikelihood::Likely,
            impact: risk::RiskImpact::Catastrophic,
            ..Default::default()
        };
        let created = risks(&server).create(model, None).await.unwrap();
        assert_eq!(created, json!({"id": "r-1"}));
    }

    #[tokio::test]
    async fn ids_cannot_reach_sibling_resources() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/contracts/c-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/risks/..%2Fcontracts%2Fc-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = risks(&server);
        let err = gateway.delete("../contracts/c-1", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream { status: 404, .. }));
        assert!(matches!(
            gateway.delete("..", None).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn mutation_clears_cached_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/risks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/risks/r-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
            .mount(&server)
            .await;

        let gateway = risks(&server);
        let query = QueryParams::new();
        gateway.list(&query, None).await.unwrap();
        gateway.list(&query, None).await.unwrap();
        gateway.delete("r-1", None).await.unwrap();
        gateway.list(&query, None).await.unwrap();
    }
}
