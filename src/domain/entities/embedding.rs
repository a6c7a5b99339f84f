use serde::{Deserialize, Serialize};

/// A sentence embedding. Serializes as a plain JSON array of floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(vec: Vec<f32>) -> Self {
        Self(vec)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_array() {
        let embedding = Embedding::new(vec![0.5, -1.0, 2.0]);
        let json = serde_json::to_string(&embedding).unwrap();
        assert_eq!(json, "[0.5,-1.0,2.0]");
    }

    #[test]
    fn test_dimension() {
        let embedding = Embedding::new(vec![0.0; 384]);
        assert_eq!(embedding.dimension(), 384);
        assert_eq!(embedding.as_slice().len(), 384);
    }
}
