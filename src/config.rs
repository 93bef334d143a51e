use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the DocChat server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory where uploads are spooled before processing.
    pub upload_dir: PathBuf,
    /// Directory holding processed files, the manifest, and the index snapshot.
    pub processed_dir: PathBuf,
    /// Directory containing the bundled front-end assets.
    pub static_dir: PathBuf,
    /// Embedding model identifier used for tokenization and chunk sizing.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional override for the automatic chunk size selection.
    pub text_splitter_chunk_size: Option<usize>,
    /// Optional token overlap between adjacent chunks.
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Number of nearest chunks retrieved per question.
    pub search_top_k: usize,
    /// Summarization backend used to phrase chat answers.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier passed to the summarization provider.
    pub summarization_model: Option<String>,
    /// Word budget applied to generated answers.
    pub summarization_max_words: usize,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported summarization backends.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Deterministic extractive answers, no external provider.
    None,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, falling back to local defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            upload_dir: PathBuf::from(load_env_or("UPLOAD_DIR", "data")),
            processed_dir: PathBuf::from(load_env_or("PROCESSED_DIR", "processed_data")),
            static_dir: PathBuf::from(load_env_or("STATIC_DIR", "build")),
            embedding_model: load_env_or("EMBEDDING_MODEL", "all-minilm-l6-v2"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION")?.unwrap_or(384),
            text_splitter_chunk_size: parse_env("TEXT_SPLITTER_CHUNK_SIZE")?,
            text_splitter_chunk_overlap: parse_env("TEXT_SPLITTER_CHUNK_OVERLAP")?,
            search_top_k: parse_env("SEARCH_TOP_K")?.unwrap_or(5),
            summarization_provider: load_env_optional("SUMMARIZATION_PROVIDER")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("SUMMARIZATION_PROVIDER".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(SummarizationProvider::None),
            summarization_model: load_env_optional("SUMMARIZATION_MODEL"),
            summarization_max_words: parse_env("SUMMARIZATION_MAX_WORDS")?.unwrap_or(120),
            ollama_url: load_env_optional("OLLAMA_URL"),
            server_port: parse_env("SERVER_PORT")?,
        })
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        upload_dir = %config.upload_dir.display(),
        processed_dir = %config.processed_dir.display(),
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        summarization_provider = ?config.summarization_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
