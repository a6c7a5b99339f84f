use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::ModelConfig;
use crate::infrastructure::embedding::OnnxEmbedder;

/// [`EmbeddingService`] backed by a local ONNX sentence-transformer.
///
/// Inference runs on the blocking thread pool so request tasks never stall
/// the runtime's workers.
#[derive(Clone)]
pub struct TextEmbedding {
    model: Arc<OnnxEmbedder>,
}

impl TextEmbedding {
    pub fn new(model: OnnxEmbedder) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    /// Loads the configured model off the async runtime.
    pub async fn load(config: ModelConfig) -> anyhow::Result<Self> {
        let model = tokio::task::spawn_blocking(move || OnnxEmbedder::load(&config))
            .await
            .context("model loading task failed")??;
        Ok(Self::new(model))
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || model.encode(&texts))
            .await
            .map_err(|e| DomainError::internal(format!("inference task failed: {e}")))?
            .map_err(|e| DomainError::inference(format!("{e:#}")))?;

        Ok(vectors.into_iter().map(Embedding::new).collect())
    }

    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Downloads the model from the Hugging Face Hub
    async fn test_embed_batch() {
        let embedding = TextEmbedding::load(ModelConfig::default()).await.unwrap();
        let texts = vec!["query: hello".to_string(), "query: world".to_string()];
        let result = embedding.embed_batch(&texts).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].dimension(), embedding.dimension());
        assert_eq!(embedding.model_name(), "intfloat/multilingual-e5-small");
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            name: dir.path().to_string_lossy().to_string(),
            ..ModelConfig::default()
        };
        assert!(TextEmbedding::load(config).await.is_err());
    }
}
