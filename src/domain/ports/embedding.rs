use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

/// A loaded sentence-embedding model.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}
