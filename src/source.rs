//! Telemetry source boundary.
//!
//! The core only needs two calls from the remote API: the company's farm
//! roster and one farm's current metrics. [`HttpTelemetrySource`] talks to the
//! real service; tests swap in their own implementation.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::models::{Farm, Metrics, RawKandangResponse};

// ---

/// Who is asking for the roster. The token is forwarded as a bearer credential.
#[derive(Debug, Clone, Default)]
pub struct CompanyContext {
    pub token: Option<String>,
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Current metrics for one farm.
    async fn fetch_reading(&self, farm: &Farm) -> Result<Metrics, FetchError>;

    /// Farms visible to the company.
    async fn fetch_farm_list(&self, company: &CompanyContext) -> Result<Vec<Farm>, FetchError>;
}

// ---

pub struct HttpTelemetrySource {
    // ---
    client: Client,
    base_url: String,
}

impl HttpTelemetrySource {
    // ---
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn reading_url(&self, farm: &Farm) -> String {
        format!("{}/api/kandang/{}", self.base_url, farm.sensor_key())
    }

    pub fn farm_list_url(&self) -> String {
        format!("{}/api/auth/company/farms", self.base_url)
    }

    async fn get_json(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        // ---
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(http_err)?;
        debug!("{} raw response: {}", url, body);
        Ok(body)
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    // ---
    async fn fetch_reading(&self, farm: &Farm) -> Result<Metrics, FetchError> {
        // ---
        let url = self.reading_url(farm);
        let body = self.get_json(&url, None).await?;

        let raw: RawKandangResponse =
            serde_json::from_value(body).map_err(|e| FetchError::Malformed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        raw.into_metrics(&url)
    }

    async fn fetch_farm_list(&self, company: &CompanyContext) -> Result<Vec<Farm>, FetchError> {
        // ---
        let url = self.farm_list_url();
        let body = self.get_json(&url, company.token.as_deref()).await?;

        let farms: Vec<Farm> = serde_json::from_value(body).map_err(|e| FetchError::Malformed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        debug!("Fetched {} farms from {}", farms.len(), url);
        Ok(farms)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_urls_are_built_from_base() {
        // ---
        let source = HttpTelemetrySource::new("http://192.168.100.30:8000/");
        let farm = Farm::new(1, "Kandang 1");

        assert_eq!(
            source.reading_url(&farm),
            "http://192.168.100.30:8000/api/kandang/Kandang_1"
        );
        assert_eq!(
            source.farm_list_url(),
            "http://192.168.100.30:8000/api/auth/company/farms"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        // ---
        // Port 9 (discard) on loopback is closed on any sane test host.
        let source = HttpTelemetrySource::new("http://127.0.0.1:9");
        let err = source
            .fetch_reading(&Farm::new(1, "Kandang 1"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Http { .. }), "{err:?}");
    }
}
