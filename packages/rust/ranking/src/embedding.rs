//! OpenAI-compatible embeddings transport.

use std::time::Duration;

use copydesk_shared::{CopydeskError, EmbeddingsConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin client for a `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingsConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .map_err(|e| CopydeskError::ranking(format!("failed to build embedding client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Embed every input in one request. The response is re-ordered by the
    /// returned `index` field so output row `i` always matches input `i`.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CopydeskError::ranking(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CopydeskError::ranking(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CopydeskError::ranking(format!("invalid embeddings response: {e}")))?;

        parsed.data.sort_by_key(|row| row.index);
        if parsed.data.len() != inputs.len() {
            return Err(CopydeskError::ranking(format!(
                "embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        debug!(vectors = parsed.data.len(), "embeddings received");
        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
