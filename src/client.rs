// Client for the managed data service (Supabase PostgREST endpoint).
use crate::config::AppConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::filters::DeliveryQuery;
use crate::types::{DeliveryRecord, Department};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DELIVERY_SELECT: &str =
    "*,secretarias(sigla,nome_completo,cor_primaria,cor_secundaria)";

/// Read-side of the data service.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Active departments ordered by code.
    async fn fetch_departments(&self) -> DashboardResult<Vec<Department>>;
    /// Delivery rows matching `query`, each joined to its department.
    async fn fetch_deliveries(&self, query: &DeliveryQuery) -> DashboardResult<Vec<DeliveryRecord>>;
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DashboardError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> DashboardResult<Self> {
        Self::new(&config.supabase_url, &config.supabase_key, config.http_timeout_secs)
    }

    fn table(&self, name: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/rest/v1/{}", self.base_url, name))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> DashboardResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::FetchStatus {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DashboardError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DataService for SupabaseClient {
    async fn fetch_departments(&self) -> DashboardResult<Vec<Department>> {
        let request = self
            .table("secretarias")
            .query(&[("select", "*"), ("ativo", "eq.true"), ("order", "sigla")]);
        let departments: Vec<Department> = self.send_json(request).await?;
        tracing::debug!(count = departments.len(), "departments loaded");
        Ok(departments)
    }

    async fn fetch_deliveries(&self, query: &DeliveryQuery) -> DashboardResult<Vec<DeliveryRecord>> {
        let request = self
            .table("entregas")
            .query(&[("select", DELIVERY_SELECT)])
            .query(&query.to_query_pairs());
        let records: Vec<DeliveryRecord> = self.send_json(request).await?;
        tracing::debug!(
            count = records.len(),
            predicates = query.predicates().len(),
            "deliveries loaded"
        );
        Ok(records)
    }
}
