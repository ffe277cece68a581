
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::{DocvecError, Result};

// A failed batch surfaces at once unless the caller opts in to retries
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    agent: ureq::Agent,
    retry_attempts: u32,
    retry_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client from config, reading the API key from the configured
    /// environment variable
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                "${} is not set; embedding requests will be sent without credentials",
                config.api_key_env
            );
        }
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit key (or none, for local servers)
    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        let endpoint = config
            .api_url()
            .and_then(|base| {
                base.join("embeddings")
                    .map_err(|_| crate::config::ConfigError::InvalidUrl(config.api_base.clone()))
            })
            .map_err(|e| DocvecError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            dimension: config.dimension,
            api_key,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Opt in to retrying 5xx and transport failures; 4xx never retries
    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; doubles on each further attempt
    #[inline]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn post_json(&self, body: &str) -> std::result::Result<String, ureq::Error> {
        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }
        request
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(DocvecError::Embedding(format!(
                                    "Client error: HTTP {}",
                                    status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(DocvecError::Embedding(format!(
                            "Non-retryable error: {}",
                            error
                        )));
                    }

                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay = self.retry_backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.endpoint);

        Err(DocvecError::Embedding(last_error.map_or_else(
            || "Request failed after retries".to_string(),
            |e| format!("Request failed after {} attempts: {}", self.retry_attempts, e),
        )))
    }
}

impl EmbeddingProvider for OpenAiClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.endpoint);

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            DocvecError::Embedding(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = self.make_request_with_retry(|| self.post_json(&request_json))?;

        let mut response: EmbeddingsResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                DocvecError::Embedding(format!("Failed to parse embedding response: {}", e))
            })?;

        if response.data.len() != texts.len() {
            return Err(DocvecError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        // Entries carry their input position; the order on the wire is not guaranteed
        response.data.sort_by_key(|entry| entry.index);

        let embeddings: Vec<Vec<f32>> = response
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect();

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(DocvecError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        debug!("Received {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}
