use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub confluence: ConfluenceConfig,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub qdrant_url: String,
    pub collection: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            embedding_model: "llama3.2".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".into(),
            collection: "confab_chunks".into(),
        }
    }
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".into(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 64,
            min_chunk_size: 128,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            confluence: ConfluenceConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CONFAB_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CONFAB_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CONFAB_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("CONFAB_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("CONFAB_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("CONFAB_CONFLUENCE_BASE_URL") {
            self.confluence.base_url = v;
        }
        if let Ok(v) = std::env::var("CONFAB_CHUNK_SIZE") {
            match v.parse() {
                Ok(n) => self.chunking.chunk_size = n,
                Err(_) => warn!("ignoring invalid CONFAB_CHUNK_SIZE: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CONFAB_CHUNK_OVERLAP") {
            match v.parse() {
                Ok(n) => self.chunking.chunk_overlap = n,
                Err(_) => warn!("ignoring invalid CONFAB_CHUNK_OVERLAP: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CONFAB_MIN_CHUNK_SIZE") {
            match v.parse() {
                Ok(n) => self.chunking.min_chunk_size = n,
                Err(_) => warn!("ignoring invalid CONFAB_MIN_CHUNK_SIZE: {v}"),
            }
        }
    }

    #[must_use]
    pub fn chunker(&self) -> confab_index::ChunkerConfig {
        confab_index::ChunkerConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            min_chunk_size: self.chunking.min_chunk_size,
            ..confab_index::ChunkerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn defaults_when_file_missing() {
        let config = Config::load(Path::new("/nonexistent/confab.toml")).unwrap();
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.store.collection, "confab_chunks");
        assert_eq!(config.chunking.chunk_size, 1024);
        assert_eq!(config.chunking.chunk_overlap, 64);
        assert_eq!(config.chunking.min_chunk_size, 128);
    }

    #[test]
    #[serial]
    fn parse_valid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
[llm]
model = "mistral:7b"

[store]
collection = "team_wiki"

[confluence]
base_url = "https://example.atlassian.net/wiki"

[chunking]
chunk_size = 512
"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.model, "mistral:7b");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.store.collection, "team_wiki");
        assert_eq!(
            config.confluence.base_url,
            "https://example.atlassian.net/wiki"
        );
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 64);
    }

    #[test]
    #[serial]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        unsafe { std::env::set_var("CONFAB_LLM_MODEL", "phi3:mini") };
        unsafe { std::env::set_var("CONFAB_COLLECTION", "override") };
        let config = Config::load(Path::new("/nonexistent/confab.toml")).unwrap();
        unsafe { std::env::remove_var("CONFAB_LLM_MODEL") };
        unsafe { std::env::remove_var("CONFAB_COLLECTION") };

        assert_eq!(config.llm.model, "phi3:mini");
        assert_eq!(config.store.collection, "override");
    }

    #[test]
    #[serial]
    fn chunking_env_overrides_apply() {
        unsafe { std::env::set_var("CONFAB_CHUNK_OVERLAP", "32") };
        unsafe { std::env::set_var("CONFAB_MIN_CHUNK_SIZE", "64") };
        let config = Config::load(Path::new("/nonexistent/confab.toml")).unwrap();
        unsafe { std::env::remove_var("CONFAB_CHUNK_OVERLAP") };
        unsafe { std::env::remove_var("CONFAB_MIN_CHUNK_SIZE") };

        assert_eq!(config.chunking.chunk_overlap, 32);
        assert_eq!(config.chunking.min_chunk_size, 64);
        assert_eq!(config.chunking.chunk_size, 1024);
    }

    #[test]
    #[serial]
    fn invalid_chunk_size_env_is_ignored() {
        unsafe { std::env::set_var("CONFAB_CHUNK_SIZE", "not-a-number") };
        let config = Config::load(Path::new("/nonexistent/confab.toml")).unwrap();
        unsafe { std::env::remove_var("CONFAB_CHUNK_SIZE") };
        assert_eq!(config.chunking.chunk_size, 1024);
    }

    #[test]
    #[serial]
    fn chunker_config_carries_sizes() {
        unsafe { std::env::set_var("CONFAB_CHUNK_SIZE", "256") };
        let config = Config::load(Path::new("/nonexistent/confab.toml")).unwrap();
        unsafe { std::env::remove_var("CONFAB_CHUNK_SIZE") };

        let chunker = config.chunker();
        assert_eq!(chunker.chunk_size, 256);
        assert_eq!(chunker.min_chunk_size, 128);
        assert_eq!(chunker.headers.len(), 6);
    }
}
