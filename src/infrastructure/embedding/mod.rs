pub mod files;
pub mod onnx;
pub mod pooling;
mod text;

pub use files::ModelFiles;
pub use onnx::OnnxEmbedder;
pub use pooling::Pooling;
pub use text::TextEmbedding;
