use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MODEL_NAME: &str = "intfloat/multilingual-e5-small";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration.
///
/// Built from defaults, then an optional YAML file named by `CONFIG_PATH`,
/// then environment variables. Later sources win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub limits: LimitsConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hub repository id or local directory.
    pub name: String,
    /// ONNX graph path relative to the model root. Searched for when unset.
    pub onnx_file: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub max_seq_length: Option<usize>,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            onnx_file: None,
            cache_dir: None,
            hf_token: None,
            max_seq_length: None,
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_batch_texts: usize,
    pub inference_batch_size: usize,
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_texts: 1024,
            inference_batch_size: 32,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("CONFIG_PATH").filter(|p| !p.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                let content = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_yaml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overrides fields from environment-style variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = var("ONNX_FILE") {
            self.model.onnx_file = Some(v);
        }
        if let Some(v) = var("MODEL_CACHE_DIR") {
            self.model.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("HF_TOKEN") {
            self.model.hf_token = Some(v);
        }
        if let Some(v) = var("MAX_SEQ_LENGTH") {
            self.model.max_seq_length = Some(parse_var("MAX_SEQ_LENGTH", v)?);
        }
        if let Some(v) = var("INTRA_THREADS") {
            self.model.intra_threads = parse_var("INTRA_THREADS", v)?;
        }
        if let Some(v) = var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("SERVER_PORT") {
            self.server.port = parse_var("SERVER_PORT", v)?;
        }
        if let Some(v) = var("MAX_BATCH_TEXTS") {
            self.limits.max_batch_texts = parse_var("MAX_BATCH_TEXTS", v)?;
        }
        if let Some(v) = var("INFERENCE_BATCH_SIZE") {
            self.limits.inference_batch_size = parse_var("INFERENCE_BATCH_SIZE", v)?;
        }
        if let Some(v) = var("MAX_BODY_BYTES") {
            self.limits.max_body_bytes = parse_var("MAX_BODY_BYTES", v)?;
        }
        if let Some(v) = var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model name must not be empty".into()));
        }
        if self.limits.max_batch_texts == 0 {
            return Err(ConfigError::Invalid("max_batch_texts must be at least 1".into()));
        }
        if self.limits.inference_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "inference_batch_size must be at least 1".into(),
            ));
        }
        if self.model.intra_threads == 0 {
            return Err(ConfigError::Invalid("intra_threads must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVar { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(env(&[])).unwrap();
        assert_eq!(config.model.name, DEFAULT_MODEL_NAME);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.limits.max_batch_texts, 1024);
        assert_eq!(config.limits.inference_batch_size, 32);
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
    }

    #[test]
    fn test_model_name_override() {
        let config =
            AppConfig::load_with(env(&[("MODEL_NAME", "sentence-transformers/all-MiniLM-L6-v2")]))
                .unwrap();
        assert_eq!(config.model.name, "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = AppConfig::load_with(env(&[("MODEL_NAME", ""), ("SERVER_PORT", " ")])).unwrap();
        assert_eq!(config.model.name, DEFAULT_MODEL_NAME);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = AppConfig::load_with(env(&[("SERVER_PORT", "http")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar {
                name: "SERVER_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = AppConfig::load_with(env(&[("INFERENCE_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_cors_origins_split() {
        let config = AppConfig::load_with(env(&[(
            "CORS_ALLOWED_ORIGINS",
            "http://a.test, http://b.test,,",
        )]))
        .unwrap();
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://a.test", "http://b.test"]
        );
    }

    #[test]
    fn test_yaml_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8081\nmodel:\n  name: from-file\n  max_seq_length: 256\nlimits:\n  max_batch_texts: 10"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = AppConfig::load_with(env(&[
            ("CONFIG_PATH", path.as_str()),
            ("MODEL_NAME", "from-env"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.name, "from-env");
        assert_eq!(config.model.max_seq_length, Some(256));
        assert_eq!(config.limits.max_batch_texts, 10);
        assert_eq!(config.limits.inference_batch_size, 32);
    }

    #[test]
    fn test_missing_config_file() {
        let err = AppConfig::load_with(env(&[("CONFIG_PATH", "/nonexistent/config.yaml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
