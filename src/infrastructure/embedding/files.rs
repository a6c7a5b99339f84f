//! Locating model files, either in a local directory or on the Hugging Face Hub.

use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::infrastructure::config::ModelConfig;

const TOKENIZER_FILE: &str = "tokenizer.json";
const MODULES_FILE: &str = "modules.json";
const POOLING_FILE: &str = "1_Pooling/config.json";
const SENTENCE_BERT_FILE: &str = "sentence_bert_config.json";
const ONNX_CANDIDATES: [&str; 2] = ["onnx/model.onnx", "model.onnx"];

/// Paths of everything needed to build an embedder.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub onnx: PathBuf,
    pub tokenizer: PathBuf,
    pub modules: Option<PathBuf>,
    pub pooling: Option<PathBuf>,
    pub sentence_bert_config: Option<PathBuf>,
}

enum Source {
    Local(PathBuf),
    Hub(ApiRepo),
}

impl Source {
    fn open(config: &ModelConfig) -> Result<Self> {
        let local = Path::new(&config.name);
        if local.is_dir() {
            info!(path = %local.display(), "loading model from local directory");
            return Ok(Source::Local(local.to_path_buf()));
        }

        // ApiBuilder::new() already picks up a token saved by `huggingface-cli login`.
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(token) = &config.hf_token {
            builder = builder.with_token(Some(token.clone()));
        }
        if let Some(dir) = &config.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .context("failed to initialise Hugging Face Hub client")?;
        info!(repo = %config.name, "resolving model from Hugging Face Hub");
        Ok(Source::Hub(api.model(config.name.clone())))
    }

    fn fetch(&self, file: &str) -> Result<PathBuf> {
        match self {
            Source::Local(root) => {
                let path = root.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(anyhow!("{} not found", path.display()))
                }
            }
            Source::Hub(repo) => repo
                .get(file)
                .with_context(|| format!("failed to fetch {file}")),
        }
    }

    fn fetch_optional(&self, file: &str) -> Option<PathBuf> {
        match self.fetch(file) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(file, error = %e, "optional model file unavailable");
                None
            }
        }
    }
}

impl ModelFiles {
    /// Resolves and, for Hub models, downloads the model files. Blocking.
    pub fn resolve(config: &ModelConfig) -> Result<Self> {
        let source = Source::open(config)?;

        let tokenizer = source
            .fetch(TOKENIZER_FILE)
            .with_context(|| format!("model {} has no {TOKENIZER_FILE}", config.name))?;

        let onnx = match &config.onnx_file {
            Some(file) => source.fetch(file)?,
            None => find_onnx(&source)
                .with_context(|| format!("model {} has no ONNX export", config.name))?,
        };

        let files = Self {
            onnx,
            tokenizer,
            modules: source.fetch_optional(MODULES_FILE),
            pooling: source.fetch_optional(POOLING_FILE),
            sentence_bert_config: source.fetch_optional(SENTENCE_BERT_FILE),
        };
        debug!(?files, "model files resolved");
        Ok(files)
    }
}

fn find_onnx(source: &Source) -> Result<PathBuf> {
    let mut last_err = None;
    for candidate in ONNX_CANDIDATES {
        match source.fetch(candidate) {
            Ok(path) => return Ok(path),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no ONNX candidates")))
}
