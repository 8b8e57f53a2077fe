//! Client for the platform's process stats endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use cachemesh_core::error::{MeshError, Result};
use cachemesh_core::traits::StatsFetcher;
use cachemesh_core::types::InstanceStats;

const RUNNING: &str = "RUNNING";

/// Stats client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapiConfig {
    /// Base URL of the platform API (e.g. "https://api.sys.example.com")
    pub api_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl CapiConfig {
    /// Creates config for the API at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: None,
            timeout_seconds: 10,
        }
    }

    /// Adds a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }
}

#[derive(Deserialize)]
struct StatsResponse {
    resources: Vec<ProcessStat>,
}

#[derive(Deserialize)]
struct ProcessStat {
    index: u32,
    #[serde(default)]
    state: Option<String>,
}

/// Reads running instances from `GET <api_url>/v3/processes/<app_id>/stats`.
pub struct CapiClient {
    config: CapiConfig,
    http_client: reqwest::Client,
}

impl CapiClient {
    /// Creates a new client.
    pub fn with_config(config: CapiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| MeshError::HttpError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn stats_url(&self, app_id: &str) -> String {
        format!(
            "{}/v3/processes/{}/stats",
            self.config.api_url.trim_end_matches('/'),
            app_id
        )
    }
}

#[async_trait]
impl StatsFetcher for CapiClient {
    #[instrument(skip(self))]
    async fn process_stats(&self, app_id: &str) -> Result<Vec<InstanceStats>> {
        let mut request = self.http_client.get(self.stats_url(app_id));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MeshError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MeshError::StatsSource {
                status: status.as_u16(),
                reason: text,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| MeshError::HttpError(e.to_string()))?;
        let parsed: StatsResponse = serde_json::from_str(&body)?;

        let total = parsed.resources.len();
        let running: Vec<InstanceStats> = parsed
            .resources
            .into_iter()
            .filter(|p| p.state.as_deref().map_or(true, |s| s == RUNNING))
            .map(|p| InstanceStats::new(p.index))
            .collect();

        debug!(total, running = running.len(), "Fetched process stats");
        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CapiClient {
        CapiClient::with_config(CapiConfig::new(server.uri()).with_token("secret")).unwrap()
    }

    #[tokio::test]
    async fn test_running_instances_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/processes/app-1/stats"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"resources":[
                    {"index":0,"state":"RUNNING"},
                    {"index":1,"state":"CRASHED"},
                    {"index":2,"state":"RUNNING"},
                    {"index":3}
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let stats = client(&server).process_stats("app-1").await.unwrap();

        assert_eq!(
            stats,
            vec![InstanceStats::new(0), InstanceStats::new(2), InstanceStats::new(3)]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_stats_source_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = client(&server).process_stats("app-1").await;

        assert!(matches!(
            result,
            Err(MeshError::StatsSource { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_payload_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server).process_stats("app-1").await;

        assert!(matches!(result, Err(MeshError::JsonError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_http_error() {
        let client = CapiClient::with_config(CapiConfig::new("http://127.0.0.1:1")).unwrap();

        let result = client.process_stats("app-1").await;

        assert!(matches!(result, Err(MeshError::HttpError(_))));
    }

    #[test]
    fn test_stats_url_trims_trailing_slash() {
        let client = CapiClient::with_config(CapiConfig::new("https://api.example.com/")).unwrap();
        assert_eq!(
            client.stats_url("app-1"),
            "https://api.example.com/v3/processes/app-1/stats"
        );
    }
}
