//! HTTP gateway implementation
//!
//! Talks JSON to the intent backend over reqwest, retrying transient
//! failures with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::extract_detail;
use super::{
    AlternativesRequest, AlternativesResponse, ClarificationResponse, ClarifyRequest, ClassifyRequest,
    ClassifyResponse, DecomposeRequest, DecompositionResponse, Gateway, GenerateRequest, GenerateResponse,
    HealthStatus, ServiceError,
};
use crate::config::GatewayConfig;

const CLASSIFY_PATH: &str = "/api/classify";
const DECOMPOSE_PATH: &str = "/api/decompose";
const CLARIFY_PATH: &str = "/api/clarify";
const ALTERNATIVES_PATH: &str = "/api/alternatives";
const GENERATE_PATH: &str = "/api/generate-intent";
const HEALTH_PATH: &str = "/health";

/// Gateway backed by the intent HTTP API
pub struct HttpGateway {
    base_url: String,
    http: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpGateway {
    /// Create a new gateway from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServiceError> {
        debug!(?config, "HttpGateway::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ServiceError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ServiceError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        self.execute(path, || self.http.post(&url).json(body)).await
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, ServiceError> {
        let url = self.url(path);
        self.execute(path, || self.http.get(&url)).await
    }

    /// Send a request, retrying transient failures
    ///
    /// `build` is called once per attempt since a RequestBuilder is consumed by send.
    async fn execute<Resp, F>(&self, path: &str, build: F) -> Result<Resp, ServiceError>
    where
        Resp: DeserializeOwned,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        debug!(%path, "execute: called");
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff * 2u32.pow(attempt - 1);
                warn!(
                    %path,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "execute: retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(%path, attempt, error = %e, "execute: network error");
                    last_error = Some(ServiceError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(%path, attempt, status, error = %e, "execute: failed reading body");
                    last_error = Some(ServiceError::Network(e));
                    continue;
                }
            };

            if !(200..300).contains(&status) {
                let err = ServiceError::Api {
                    status,
                    message: extract_detail(status, &body),
                };
                if err.is_retryable() && attempt < self.max_retries {
                    debug!(%path, attempt, status, "execute: retryable error");
                    last_error = Some(err);
                    continue;
                }
                debug!(%path, status, "execute: API error");
                return Err(err);
            }

            debug!(%path, status, body_len = body.len(), "execute: success");
            return serde_json::from_str(&body).map_err(ServiceError::from);
        }

        Err(last_error.unwrap_or_else(|| ServiceError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ServiceError> {
        debug!(input_len = request.user_input.len(), "classify: called");
        self.post(CLASSIFY_PATH, request).await
    }

    async fn decompose(&self, request: &DecomposeRequest) -> Result<DecompositionResponse, ServiceError> {
        debug!(input_len = request.user_input.len(), "decompose: called");
        self.post(DECOMPOSE_PATH, request).await
    }

    async fn clarify(&self, request: &ClarifyRequest) -> Result<ClarificationResponse, ServiceError> {
        debug!(
            validated = request.validated_names.len(),
            refused = request.refused_names.len(),
            "clarify: called"
        );
        self.post(CLARIFY_PATH, request).await
    }

    async fn alternatives(&self, request: &AlternativesRequest) -> Result<AlternativesResponse, ServiceError> {
        debug!(refused = request.refused_names.len(), "alternatives: called");
        self.post(ALTERNATIVES_PATH, request).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        debug!(validated = request.validated.len(), "generate: called");
        self.post(GENERATE_PATH, request).await
    }

    async fn health(&self) -> Result<HealthStatus, ServiceError> {
        debug!("health: called");
        self.get(HEALTH_PATH).await
    }
}
