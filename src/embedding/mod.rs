//! Text-to-vector embedding providers.
//!
//! The engine only schedules embedding work; vectors come from an external
//! service behind [`EmbeddingProvider`]. [`create_provider`] builds one from
//! configuration.

pub mod http;

use crate::config::EmbeddingConfig;
use crate::error::{MemoryError, Result};

/// Trait for embedding text into vectors.
///
/// All methods are synchronous and may block on network I/O; callers in async
/// contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The output has one vector per input, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("provider returned no vector".into()))
    }

    /// Identifier recorded in `schema_meta` after a backfill.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// `"openai"` talks to any OpenAI-compatible `/embeddings` endpoint. The API
/// key is read from the env var named by `api_key_env`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                MemoryError::Setup(format!(
                    "embedding provider needs an API key in ${}",
                    config.api_key_env
                ))
            })?;
            let provider = http::HttpEmbeddingProvider::new(&config.endpoint, &config.model, api_key)?;
            Ok(Box::new(provider))
        }
        "none" => Err(MemoryError::Setup(
            "embeddings are disabled (embedding.provider = \"none\")".into(),
        )),
        other => Err(MemoryError::Setup(format!(
            "unknown embedding provider: {other}. Supported: openai, none"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "onnx".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }

    #[test]
    fn disabled_provider_is_a_setup_error() {
        let config = EmbeddingConfig {
            provider: "none".into(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(create_provider(&config), Err(MemoryError::Setup(_))));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = EmbeddingConfig {
            api_key_env: "CAIRN_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("CAIRN_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
