use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Directory of source documents (.pdf, .txt, .md).
    pub dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum cosine distance a result may have before it is discarded.
    /// 2.0 (the metric's maximum) disables filtering entirely.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_distance() -> f32 {
    1.25
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds. Default: 7 days.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: i64,
    /// Byte budget before least-recently-used entries are evicted.
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_bytes: default_cache_max_bytes(),
        }
    }
}

fn default_cache_ttl() -> i64 {
    7 * 24 * 60 * 60
}
fn default_cache_max_bytes() -> i64 {
    5 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_openai_base")]
    pub base_url: String,
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
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            base_url: default_openai_base(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
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
pub struct ModelConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Hard cap on generate ⇄ tool-execute rounds per request.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            model: default_chat_model(),
            max_tool_rounds: default_max_tool_rounds(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tool_rounds() -> usize {
    8
}
fn default_model_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// The person the assistant speaks as.
    #[serde(default = "default_assistant_name")]
    pub name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
        }
    }
}

fn default_assistant_name() -> String {
    "the site owner".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyConfig {
    /// Push notifications require PUSHOVER_TOKEN and PUSHOVER_USER in the
    /// environment; when disabled, notifications are skipped silently.
    #[serde(default)]
    pub enabled: bool,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.knowledge.chunk_size == 0 {
        anyhow::bail!("knowledge.chunk_size must be > 0");
    }

    // A non-advancing chunk window would loop forever at indexing time.
    if config.knowledge.overlap >= config.knowledge.chunk_size {
        anyhow::bail!(
            "knowledge.overlap ({}) must be smaller than knowledge.chunk_size ({})",
            config.knowledge.overlap,
            config.knowledge.chunk_size
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(config.retrieval.max_distance > 0.0 && config.retrieval.max_distance <= 2.0) {
        anyhow::bail!("retrieval.max_distance must be in (0.0, 2.0]");
    }

    if config.cache.ttl_secs <= 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }
    if config.cache.max_bytes <= 0 {
        anyhow::bail!("cache.max_bytes must be > 0");
    }

    if config.model.max_tool_rounds < 1 {
        anyhow::bail!("model.max_tool_rounds must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
        [db]
        path = "data/concierge.sqlite"

        [knowledge]
        dir = "data/knowledge"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.knowledge.chunk_size, 500);
        assert_eq!(config.knowledge.overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.max_distance - 1.25).abs() < f32::EPSILON);
        assert_eq!(config.cache.ttl_secs, 604_800);
        assert_eq!(config.cache.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.model.max_tool_rounds, 8);
        assert!(!config.embedding.is_enabled());
        assert!(!config.notify.enabled);
    }

    #[test]
    fn test_overlap_ge_chunk_size_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [knowledge]
            dir = "kb"
            chunk_size = 100
            overlap = 100
        "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_max_distance_bounds() {
        let bad = r#"
            [db]
            path = "x.sqlite"
            [knowledge]
            dir = "kb"
            [retrieval]
            max_distance = 2.5
        "#;
        assert!(parse(bad).is_err());

        let edge = r#"
            [db]
            path = "x.sqlite"
            [knowledge]
            dir = "kb"
            [retrieval]
            max_distance = 2.0
        "#;
        assert!(parse(edge).is_ok());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [knowledge]
            dir = "kb"
            [embedding]
            provider = "openai"
        "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [knowledge]
            dir = "kb"
            [embedding]
            provider = "cohere"
            model = "embed-v3"
            dims = 1024
        "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
