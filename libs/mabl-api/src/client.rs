//! Execution client capability and its REST implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ClientError;
use crate::model::{CreateDeploymentRequest, DeploymentHandle, ExecutionSnapshot};

/// Default mabl API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.mabl.com";

const DEPLOYMENT_TRIGGER_PATH: &str = "/events/deployment";
const DEPLOYMENT_RESULT_PATH: &str = "/execution/result/event";

/// Basic auth user name mabl expects alongside an API key.
const API_KEY_USER: &str = "key";

/// Operations needed to trigger and follow a deployment event.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Trigger a deployment event for an environment and application.
    async fn create_deployment_event(
        &self,
        environment_id: &str,
        application_id: &str,
    ) -> Result<DeploymentHandle, ClientError>;

    /// Fetch the current results for a deployment event.
    ///
    /// Returns `Ok(None)` when the service does not know the id.
    async fn get_execution_results(
        &self,
        deployment_id: &str,
    ) -> Result<Option<ExecutionSnapshot>, ClientError>;

    /// Release the client. Safe to call more than once.
    fn close(&mut self);
}

/// Settings for [`RestApiClient`].
#[derive(Clone)]
pub struct RestApiConfig {
    /// API base URL.
    pub api_url: String,

    /// mabl API key.
    pub api_key: String,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RestApiConfig {
    /// Config for the public endpoint with the default timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl std::fmt::Debug for RestApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestApiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// HTTP client for the mabl REST API.
pub struct RestApiClient {
    /// `None` once closed.
    client: Option<reqwest::Client>,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for RestApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestApiClient")
            .field("base_url", &self.base_url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RestApiClient {
    /// Build a client from config.
    pub fn new(config: &RestApiConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client: Some(client),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn http(&self) -> Result<&reqwest::Client, ClientError> {
        self.client.as_ref().ok_or(ClientError::Closed)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn error_for(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ClientError::from_status(status, body)
    }
}

#[async_trait]
impl ExecutionClient for RestApiClient {
    async fn create_deployment_event(
        &self,
        environment_id: &str,
        application_id: &str,
    ) -> Result<DeploymentHandle, ClientError> {
        let url = self.url(DEPLOYMENT_TRIGGER_PATH);
        let request = CreateDeploymentRequest {
            environment_id: environment_id.to_string(),
            application_id: application_id.to_string(),
        };
        debug!(url = %url, environment_id, application_id, "Creating deployment event");

        let response = self
            .http()?
            .post(&url)
            .basic_auth(API_KEY_USER, Some(&self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Deployment event response");
        if !status.is_success() {
            return Err(Self::error_for(response).await);
        }

        Self::decode(response).await
    }

    async fn get_execution_results(
        &self,
        deployment_id: &str,
    ) -> Result<Option<ExecutionSnapshot>, ClientError> {
        let url = self.url(&format!("{}/{}", DEPLOYMENT_RESULT_PATH, deployment_id));
        debug!(url = %url, "Fetching execution results");

        let response = self
            .http()?
            .get(&url)
            .basic_auth(API_KEY_USER, Some(&self.api_key))
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Execution results response");
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::error_for(response).await);
        }

        Self::decode(response).await.map(Some)
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("mabl API client closed");
        }
    }
}
