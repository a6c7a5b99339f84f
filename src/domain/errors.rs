use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Batch of {count} texts exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
