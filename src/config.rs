use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Where per-collection store files live. Each collection gets one SQLite
/// file at `<root>/<collection>.db`.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

/// Where collection source directories live. Each subdirectory of `root`
/// is one collection of plain-text files.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Character budget per chunk for the paragraph-aligned policy.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Window size for the legacy fixed-window policy.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Overlap between consecutive windows for the legacy policy.
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            window_size: default_window_size(),
            window_overlap: default_window_overlap(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    crate::chunker::DEFAULT_MAX_CHUNK_SIZE
}
fn default_window_size() -> usize {
    1000
}
fn default_window_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"http"` for the HTTP backend, `"disabled"` to turn embeddings off.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL of the embedding backend.
    #[serde(default)]
    pub url: Option<String>,
    /// Documents are embedded over this prefix only; chunks use full text.
    #[serde(default = "default_doc_prefix_chars")]
    pub doc_prefix_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            doc_prefix_chars: default_doc_prefix_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_doc_prefix_chars() -> usize {
    8000
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            keyword_weight: default_keyword_weight(),
            semantic_weight: default_semantic_weight(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_keyword_weight() -> f64 {
    crate::fusion::DEFAULT_KEYWORD_WEIGHT
}
fn default_semantic_weight() -> f64 {
    crate::fusion::DEFAULT_SEMANTIC_WEIGHT
}

impl Config {
    /// A bare configuration rooted at the given directories. Used by tests
    /// and by commands that can run without a config file.
    pub fn minimal(storage_root: &Path, sources_root: &Path) -> Self {
        Self {
            storage: StorageConfig {
                root: storage_root.to_path_buf(),
            },
            sources: SourcesConfig {
                root: sources_root.to_path_buf(),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }
    if config.chunking.window_overlap >= config.chunking.window_size {
        anyhow::bail!("chunking.window_overlap must be < chunking.window_size");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.keyword_weight) {
        anyhow::bail!("retrieval.keyword_weight must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.retrieval.semantic_weight) {
        anyhow::bail!("retrieval.semantic_weight must be in [0.0, 1.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "http" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("quarry.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let (_tmp, path) = write_config(
            r#"
[storage]
root = "/tmp/quarry/store"

[sources]
root = "/tmp/quarry/sources"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.max_chunk_size, 1200);
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.embedding.doc_prefix_chars, 8000);
        assert!((cfg.retrieval.keyword_weight - 0.3).abs() < 1e-9);
        assert!((cfg.retrieval.semantic_weight - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let (_tmp, path) = write_config(
            r#"
[storage]
root = "/tmp/s"

[sources]
root = "/tmp/c"

[embedding]
provider = "http"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let (_tmp, path) = write_config(
            r#"
[storage]
root = "/tmp/s"

[sources]
root = "/tmp/c"

[retrieval]
keyword_weight = 1.5
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
