//! Test doubles shared by unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};

/// Deterministic [`EmbeddingService`]: the first component of each vector is
/// the character count of its text, the rest are zeros.
pub struct StubEmbedding {
    dimension: usize,
    fail: bool,
    drop_last: bool,
    calls: Mutex<Vec<usize>>,
}

impl StubEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            drop_last: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(4)
        }
    }

    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Batch sizes of every `embed_batch` call so far.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingService for StubEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, DomainError> {
        self.calls.lock().unwrap().push(texts.len());
        if self.fail {
            return Err(DomainError::inference("stub inference failure"));
        }

        let mut out: Vec<Embedding> = texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; self.dimension];
                v[0] = text.chars().count() as f32;
                Embedding::new(v)
            })
            .collect();
        if self.drop_last {
            out.pop();
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}
