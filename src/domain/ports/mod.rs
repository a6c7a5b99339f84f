mod embedding;

pub use embedding::EmbeddingService;
