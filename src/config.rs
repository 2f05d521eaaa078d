//! TOML configuration.
//!
//! All tunables live in one file; API keys are read from the environment
//! using the variable names configured here, never from the file itself.
//! See `config/advisor.example.toml` for a full example.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AdvisorError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalogs: Vec<CatalogConfig>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// One ingestible catalog: a name (used as the index namespace) and the
/// path of its JSON file. The CSV row source is the sibling with the same
/// stem.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            namespace: default_namespace(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_namespace() -> String {
    "resources".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            api_key_env: default_embedding_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_base_url() -> String {
    // Any OpenAI-compatible embeddings endpoint; TEI serves this shape.
    "http://localhost:8080/v1".to_string()
}
fn default_embedding_model() -> String {
    "intfloat/multilingual-e5-large".to_string()
}
fn default_embedding_dims() -> usize {
    1024
}
fn default_embedding_key_env() -> String {
    "EMBEDDINGS_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            temperature: 0.0,
            api_key_env: default_generation_key_env(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_generation_model() -> String {
    "meta-llama/llama-3.2-3b-instruct:free".to_string()
}
fn default_generation_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `memory` (in-process, ephemeral) or `qdrant` (remote, persistent).
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: default_index_url(),
            collection: default_collection(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_index_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "advisor".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Exact origin allowed for browser clients; unset means any origin.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origin: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, AdvisorError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AdvisorError::Configuration(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| AdvisorError::Configuration(format!("failed to parse config file: {}", e)))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), AdvisorError> {
    if config.retrieval.top_k == 0 {
        return Err(AdvisorError::Configuration(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }

    if config.chunking.max_chars == 0 {
        return Err(AdvisorError::Configuration(
            "chunking.max_chars must be > 0".to_string(),
        ));
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        return Err(AdvisorError::Configuration(
            "chunking.overlap_chars must be smaller than chunking.max_chars".to_string(),
        ));
    }

    if config.embedding.dims == 0 {
        return Err(AdvisorError::Configuration(
            "embedding.dims must be > 0".to_string(),
        ));
    }
    if config.embedding.model.is_empty() {
        return Err(AdvisorError::Configuration(
            "embedding.model must not be empty".to_string(),
        ));
    }

    if config.generation.model.is_empty() {
        return Err(AdvisorError::Configuration(
            "generation.model must not be empty".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(AdvisorError::Configuration(
            "generation.temperature must be in [0.0, 2.0]".to_string(),
        ));
    }

    match config.index.provider.as_str() {
        "memory" | "qdrant" => {}
        other => {
            return Err(AdvisorError::Configuration(format!(
                "unknown index provider: '{}'. Must be memory or qdrant.",
                other
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load_from(content: &str) -> Result<Config, AdvisorError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("advisor.toml");
        fs::write(&path, content).unwrap();
        load_config(&path)
    }

    #[test]
    fn test_defaults_apply() {
        let config = load_from(
            r#"
[[catalogs]]
name = "courses"
path = "./data/courses.json"
"#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.namespace, "resources");
        assert_eq!(config.index.provider, "memory");
        assert!(!config.chunking.enabled);
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.generation.temperature, 0.0);
    }

    #[test]
    fn test_invalid_top_k_rejected() {
        let err = load_from("[retrieval]\ntop_k = 0\n").unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        let err = load_from("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_unknown_index_provider_rejected() {
        let err = load_from("[index]\nprovider = \"pinecone\"\n").unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }
}
