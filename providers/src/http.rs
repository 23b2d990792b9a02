//! JSON-over-HTTP implementation of the backend contract.

use atelier_types::{GenerationRequest, GenerationResult};

use crate::retry::{RetryConfig, send_with_retry};
use crate::{BackendError, GenerationBackend, http_client, read_capped_error_body};

/// HTTP generation backend.
///
/// Posts the camelCase JSON request to a single endpoint and parses the
/// response body as a [`GenerationResult`]. Uses the shared hardened client
/// unless one is supplied (tests swap in a plain client to reach loopback
/// servers, which the hardened client's TLS-only policy refuses).
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: http_client().clone(),
            endpoint: endpoint.into(),
            api_key: None,
            retry: RetryConfig::default(),
        }
    }

    /// Bearer token attached to every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl GenerationBackend for HttpBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, BackendError> {
        let response = send_with_retry(
            || {
                let mut builder = self.client.post(&self.endpoint).json(request);
                if let Some(key) = &self.api_key {
                    builder = builder.bearer_auth(key);
                }
                builder
            },
            &self.retry,
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_capped_error_body(response).await;
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GenerationResult>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }
}
