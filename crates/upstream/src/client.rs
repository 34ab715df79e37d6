//! Resilient HTTP invocation primitive.

use std::sync::Arc;

use reqwest::{Client, Method, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, error, warn};

use chatgate_core::{UpstreamCallError, UpstreamErrorKind};

use crate::{
    ApiEnvelope, RetryPolicy, UpstreamConfig,
    mapping::map_error_response,
};

/// Well-known liveness path exposed by every backend.
pub const HEALTH_PATH: &str = "/actuator/health";

const API_KEY_HEADER: &str = "X-API-Key";

/// Decoded 2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub payload: Value,
    pub status: u16,
}

/// Shared HTTP client for all backend services.
///
/// Cheap to clone; the inner [`reqwest::Client`] keeps one connection pool
/// per host and is safe for concurrent use.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    config: Arc<UpstreamConfig>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Call `base_url + path`, retrying outages within the method's budget.
    ///
    /// Application errors (4xx) are returned on first sight; transport
    /// failures and 5xx responses are retried after a fixed delay.
    pub async fn invoke(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamCallError> {
        let policy = RetryPolicy::for_method(&method, self.config.retry_delay);
        let mut retries = 0;

        loop {
            match self.send_once(base_url, &method, path, body, bearer).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && policy.should_retry(retries) => {
                    retries += 1;
                    warn!(
                        %method,
                        base_url,
                        path,
                        retry = retries,
                        kind = %e.kind,
                        "upstream call failed; retrying"
                    );
                    tokio::time::sleep(policy.delay_for_attempt(retries)).await;
                }
                Err(e) => {
                    error!(
                        %method,
                        base_url,
                        path,
                        kind = %e.kind,
                        error = %e.message,
                        "upstream call failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// [`invoke`](Self::invoke) with a typed body, returning the envelope's `data`.
    pub async fn call<B, T>(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<T, UpstreamCallError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                UpstreamCallError::new(
                    UpstreamErrorKind::BadRequest,
                    format!("unserializable request body: {e}"),
                    base_url,
                )
            })?;

        let response = self
            .invoke(base_url, method, path, body.as_ref(), bearer)
            .await?;

        serde_json::from_value::<ApiEnvelope<T>>(response.payload)
            .map(|envelope| envelope.data)
            .map_err(|e| {
                UpstreamCallError::new(
                    UpstreamErrorKind::Unknown,
                    format!("unexpected response shape: {e}"),
                    format!("{}{}", base_url.trim_end_matches('/'), path),
                )
            })
    }

    /// Short-timeout liveness probe; any failure is reported as `false`.
    pub async fn check_health(&self, base_url: &str) -> bool {
        let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH);
        match self
            .http
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "health probe failed");
                false
            }
        }
    }

    async fn send_once(
        &self,
        base_url: &str,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamCallError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .timeout(self.config.timeout)
            .header(CONTENT_TYPE, "application/json");

        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(token) = bearer.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            debug!(url, error = %e, "transport failure");
            UpstreamCallError::unavailable(base_url)
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            debug!(url, error = %e, "failed reading upstream body");
            UpstreamCallError::unavailable(base_url)
        })?;

        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => v,
                Err(_) if status >= 400 => Value::Null,
                Err(e) => {
                    return Err(UpstreamCallError::new(
                        UpstreamErrorKind::Unknown,
                        format!("invalid JSON from upstream: {e}"),
                        url,
                    ));
                }
            }
        };

        if status >= 400 {
            return Err(map_error_response(status, &payload, &url));
        }

        Ok(UpstreamResponse { payload, status })
    }
}
