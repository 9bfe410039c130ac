//! OpenAI-compatible embedding client.
//!
//! Posts `{input, model}` to `{endpoint}/embeddings` with a bearer key and reads
//! `data[].embedding`. Works with OpenAI, OpenRouter, and local servers that
//! speak the same API. Uses the blocking reqwest client: every caller is
//! already on a blocking thread.

use std::time::Duration;

use serde::Deserialize;

use super::EmbeddingProvider;
use crate::error::{MemoryError, Result};

pub struct HttpEmbeddingProvider {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: &str, model: &str, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MemoryError::Setup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        })
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "input": texts,
                "model": self.model,
            }))
            .send()
            .map_err(|e| MemoryError::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MemoryError::Embedding(format!(
                "embedding API error {status}: {body}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| MemoryError::Embedding(format!("invalid response: {e}")))?;
        order_vectors(body, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Put vectors back in input order and check there is one per input.
fn order_vectors(mut body: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if body.data.len() != expected {
        return Err(MemoryError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            body.data.len()
        )));
    }
    if body.data.iter().all(|item| item.index.is_some()) {
        body.data.sort_by_key(|item| item.index);
    }
    Ok(body.data.into_iter().map(|item| item.embedding).collect())
}
