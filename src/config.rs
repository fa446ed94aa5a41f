use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `vectors.bin`, `tracks.db` and `metadata.json`
    /// (overrides XDG default).
    pub index_dir: Option<PathBuf>,
    pub embedding: EmbeddingConfig,
    pub curation: CurationConfig,
    pub generator: GeneratorConfig,
}

/// Remote embeddings endpoint used to encode queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible `/embeddings` URL.
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://router.huggingface.co/v1/embeddings".to_string(),
            api_key_env: "HF_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Knobs for candidate retrieval, scoring and progression length.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// Locale-independent retrieval query.
    pub base_query: String,
    /// Candidates retrieved before filtering.
    pub pool_size: usize,
    /// Tracks below this popularity are dropped.
    pub popularity_floor: f64,
    /// Hard cap on progression length.
    pub max_tracks: usize,
    pub default_location: String,
    /// Add per-minute score jitter.
    pub jitter: bool,
    /// Tracks exposed to the generator as its vocabulary.
    pub catalog_max_items: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            base_query: "healing therapeutic calm compassionate gentle uplifting safety \
                         non-explicit vocal pop familiar"
                .to_string(),
            pool_size: 600,
            popularity_floor: 60.0,
            max_tracks: 18,
            default_location: "Indonesia".to_string(),
            jitter: true,
            catalog_max_items: 80,
        }
    }
}

/// Chat-completion service that writes playlists from a catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// OpenAI-compatible `/chat/completions` URL.
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://router.huggingface.co/v1/chat/completions".to_string(),
            model: "openai/gpt-oss-120b:groq".to_string(),
            api_key_env: "HF_TOKEN".to_string(),
            timeout_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/isotune/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    /// Logs a warning if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the index directory: config value, else XDG default.
    pub fn resolve_index_dir(&self) -> PathBuf {
        self.index_dir.clone().unwrap_or_else(default_index_dir)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Default index location under the XDG data directory.
pub fn default_index_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().join("index")
    } else {
        // Fallback: current directory
        PathBuf::from("index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.curation.pool_size, 600);
        assert_eq!(config.curation.popularity_floor, 60.0);
        assert_eq!(config.curation.max_tracks, 18);
        assert!(config.curation.jitter);
        assert_eq!(config.embedding.api_key_env, "HF_TOKEN");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            index_dir = "/srv/isotune/index"

            [curation]
            popularity_floor = 40.0
            default_location = "Japan"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.index_dir, Some(PathBuf::from("/srv/isotune/index")));
        assert_eq!(config.curation.popularity_floor, 40.0);
        assert_eq!(config.curation.default_location, "Japan");
        assert_eq!(config.curation.pool_size, 600);
        assert_eq!(config.generator.timeout_secs, 60);
    }

    #[test]
    fn test_load_from_unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "curation = [not toml").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.curation.max_tracks, 18);
    }
}
