use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};

/// The embed use case: request-size policy and order-preserving chunked
/// inference on top of an [`EmbeddingService`].
pub struct EmbedService {
    embedding: Arc<dyn EmbeddingService>,
    max_batch_texts: usize,
    inference_batch_size: usize,
}

impl EmbedService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        max_batch_texts: usize,
        inference_batch_size: usize,
    ) -> Self {
        Self {
            embedding,
            max_batch_texts,
            inference_batch_size: inference_batch_size.max(1),
        }
    }

    /// Returns one embedding per text, in input order.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.max_batch_texts {
            return Err(DomainError::BatchTooLarge {
                count: texts.len(),
                limit: self.max_batch_texts,
            });
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.inference_batch_size) {
            let batch = self.embedding.embed_batch(chunk).await?;
            if batch.len() != chunk.len() {
                return Err(DomainError::internal(format!(
                    "model returned {} embeddings for {} texts",
                    batch.len(),
                    chunk.len()
                )));
            }
            embeddings.extend(batch);
        }

        debug!(
            count = embeddings.len(),
            dimension = self.embedding.dimension(),
            "texts embedded"
        );
        Ok(embeddings)
    }

    pub fn model_name(&self) -> &str {
        self.embedding.model_name()
    }

    pub fn dimension(&self) -> usize {
        self.embedding.dimension()
    }
}
