pub mod config;
pub mod embedding;

pub use config::{AppConfig, ConfigError, CorsConfig, LimitsConfig, ModelConfig, ServerConfig};
pub use embedding::{OnnxEmbedder, TextEmbedding};
