//! Sentence-transformer inference on ONNX Runtime.
//!
//! The session is held behind a mutex: ONNX Runtime sessions need exclusive
//! access to run, so concurrent callers are served one at a time.

use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::sync::Mutex;
use tokenizers::{Encoding, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::files::ModelFiles;
use super::pooling::{self, Pooling};
use crate::infrastructure::config::ModelConfig;

const DEFAULT_MAX_SEQ_LENGTH: usize = 512;
const PAD_TOKENS: [&str; 2] = ["<pad>", "[PAD]"];

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
    dimension: usize,
    max_seq_length: usize,
    pooling: Pooling,
    normalize: bool,
    pad_id: i64,
    uses_token_type_ids: bool,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_seq_length", &self.max_seq_length)
            .field("pooling", &self.pooling)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbedder {
    /// Resolves, downloads and loads the configured model, then runs a warm-up
    /// inference to learn its output dimension. Blocking; may take minutes on
    /// a cold cache.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let files = ModelFiles::resolve(config)?;
        Self::from_files(config, &files)
    }

    pub fn from_files(config: &ModelConfig, files: &ModelFiles) -> Result<Self> {
        let pooling = match &files.pooling {
            Some(path) => Pooling::from_config_json(&fs::read_to_string(path)?)
                .with_context(|| format!("invalid pooling config {}", path.display()))?,
            None => Pooling::default(),
        };
        let normalize = match &files.modules {
            Some(path) => pooling::normalize_from_modules_json(&fs::read_to_string(path)?)
                .with_context(|| format!("invalid modules file {}", path.display()))?,
            None => false,
        };
        let model_max_seq_length = match &files.sentence_bert_config {
            Some(path) => pooling::max_seq_length_from_json(&fs::read_to_string(path)?)
                .with_context(|| format!("invalid sentence-transformers config {}", path.display()))?,
            None => None,
        };
        let max_seq_length = config
            .max_seq_length
            .or(model_max_seq_length)
            .unwrap_or(DEFAULT_MAX_SEQ_LENGTH);

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("failed to configure truncation: {e}"))?;
        let pad_id = resolve_pad_id(&tokenizer);

        let session = Session::builder()
            .context("failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("failed to set intra threads")?
            .commit_from_file(&files.onnx)
            .with_context(|| format!("failed to load ONNX model from {}", files.onnx.display()))?;
        let uses_token_type_ids =
            needs_token_type_ids(session.inputs.iter().map(|input| input.name.as_str()));

        let mut embedder = Self {
            session: Mutex::new(session),
            tokenizer,
            model_name: config.name.clone(),
            dimension: 0,
            max_seq_length,
            pooling,
            normalize,
            pad_id,
            uses_token_type_ids,
        };

        let warmup = embedder
            .encode(&["warm-up".to_string()])
            .context("warm-up inference failed")?;
        embedder.dimension = warmup.first().map(Vec::len).unwrap_or(0);
        if embedder.dimension == 0 {
            anyhow::bail!("model {} produced an empty embedding", config.name);
        }

        info!(
            model = %embedder.model_name,
            dimension = embedder.dimension,
            max_seq_length,
            pooling = ?pooling,
            normalize,
            "embedding model loaded"
        );
        Ok(embedder)
    }

    /// Embeds `texts` in a single inference call. Blocking.
    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;

        let (input_ids, attention_mask) = batch_inputs(&encodings, self.pad_id);
        let (batch, seq_len) = input_ids.dim();
        let mask_for_pooling = attention_mask.clone();
        debug!(batch, seq_len, "running inference");

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("inference session lock poisoned"))?;
        let outputs = if self.uses_token_type_ids {
            let token_type_ids = Array2::<i64>::zeros((batch, seq_len));
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?,
                "token_type_ids" => Value::from_array(token_type_ids)?
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?
            ])?
        };

        // First output: last_hidden_state or an already pooled sentence vector.
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("failed to extract output tensor")?;
        let embeddings = pooling::sentence_embeddings(
            output,
            mask_for_pooling.view(),
            self.pooling,
            self.normalize,
        )?;
        Ok(embeddings)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Pad id from the tokenizer's padding config, else a conventional pad token,
/// else 0.
fn resolve_pad_id(tokenizer: &Tokenizer) -> i64 {
    tokenizer
        .get_padding()
        .map(|p| p.pad_id)
        .or_else(|| PAD_TOKENS.iter().find_map(|t| tokenizer.token_to_id(t)))
        .unwrap_or(0) as i64
}

/// BERT-style exports take `token_type_ids`; XLM-R and most E5 exports don't.
fn needs_token_type_ids<'a>(input_names: impl IntoIterator<Item = &'a str>) -> bool {
    input_names.into_iter().any(|name| name == "token_type_ids")
}

/// Builds right-padded `(input_ids, attention_mask)` tensors of shape
/// `(batch, longest row)`. The sequence axis is at least 1 so a batch of
/// empty texts still yields a valid tensor, fully masked.
fn batch_inputs(encodings: &[Encoding], pad_id: i64) -> (Array2<i64>, Array2<i64>) {
    let batch = encodings.len();
    let seq_len = encodings
        .iter()
        .map(|enc| enc.get_ids().len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut input_ids = Array2::<i64>::from_elem((batch, seq_len), pad_id);
    let mut attention_mask = Array2::<i64>::zeros((batch, seq_len));
    for (row, encoding) in encodings.iter().enumerate() {
        for (col, (&id, &mask)) in encoding
            .get_ids()
            .iter()
            .zip(encoding.get_attention_mask())
            .enumerate()
        {
            input_ids[[row, col]] = id as i64;
            attention_mask[[row, col]] = mask as i64;
        }
    }
    (input_ids, attention_mask)
}
