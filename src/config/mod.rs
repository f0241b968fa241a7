//! Configuration management.
//!
//! Settings come from an optional TOML file, overridden by `SCHOLAR_SEARCH_*`
//! environment variables (nested keys separated by `__`, e.g.
//! `SCHOLAR_SEARCH_OPENALEX__EMAIL`). The well-known `OPENALEX_EMAIL` and
//! `SEMANTIC_SCHOLAR_API_KEY` variables are honored when the file leaves those unset.
//!
//! ```toml
//! [search]
//! sources = ["arxiv", "openalex", "semantic_scholar"]
//! fallback_on_empty = true
//! deadline_secs = 60
//!
//! [openalex]
//! email = "me@example.org"
//! min_interval_ms = 10
//!
//! [semantic_scholar]
//! api_key = "..."
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! initial_delay = 1000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::SourceKind;
use crate::utils::RetryConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "SCHOLAR_SEARCH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub arxiv: SourceConfig,
    pub openalex: SourceConfig,
    pub semantic_scholar: SourceConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML text (no environment overrides)
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Settings for one backend
    pub fn source(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Arxiv => &self.arxiv,
            SourceKind::OpenAlex => &self.openalex,
            SourceKind::SemanticScholar => &self.semantic_scholar,
        }
    }

    /// Fill credentials left unset from the conventional environment variables
    pub fn apply_env_fallbacks(&mut self) {
        self.apply_fallbacks_from(|key| std::env::var(key).ok());
    }

    fn apply_fallbacks_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.openalex.email.is_none() {
            self.openalex.email = lookup("OPENALEX_EMAIL").filter(|v| !v.trim().is_empty());
        }
        if self.semantic_scholar.api_key.is_none() {
            self.semantic_scholar.api_key =
                lookup("SEMANTIC_SCHOLAR_API_KEY").filter(|v| !v.trim().is_empty());
        }
    }
}

/// Fallback orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Fallback order; sources not listed are not registered
    pub sources: Vec<SourceKind>,

    /// Move on to the next source when one answers with zero matches
    pub fallback_on_empty: bool,

    /// Upper bound for one whole fallback chain
    pub deadline_secs: Option<u64>,

    /// Papers kept per source by `compare`
    pub compare_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sources: SourceKind::PRIORITY.to_vec(),
            fallback_on_empty: true,
            deadline_secs: None,
            compare_limit: 5,
        }
    }
}

impl SearchConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// Per-backend connection settings. Unset values use the adapter's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Minimum interval between requests to this backend
    pub min_interval_ms: Option<u64>,
    /// Contact address for polite-pool access (OpenAlex)
    pub email: Option<String>,
    /// API key (Semantic Scholar)
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            timeout_secs: None,
            min_interval_ms: None,
            email: None,
            api_key: None,
            user_agent: None,
        }
    }
}

impl SourceConfig {
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    pub fn min_interval_or(&self, default: Option<Duration>) -> Option<Duration> {
        self.min_interval_ms.map(Duration::from_millis).or(default)
    }

    /// Configured base URL without a trailing slash, or the given default
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::Io(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("search.sources")
                .try_parsing(true),
        )
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.apply_env_fallbacks();
    Ok(config)
}

/// Get the default configuration with environment credentials applied
pub fn get_config() -> Config {
    let mut config = Config::default();
    config.apply_env_fallbacks();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.sources, SourceKind::PRIORITY.to_vec());
        assert!(config.search.fallback_on_empty);
        assert!(config.search.deadline().is_none());
        assert!(config.arxiv.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = Config::from_toml_str(
            r#"
[search]
sources = ["semantic_scholar", "openalex"]
fallback_on_empty = false
deadline_secs = 20

[openalex]
email = "me@example.org"
min_interval_ms = 250

[retry]
max_attempts = 5
initial_delay = 200
"#,
        )
        .unwrap();

        assert_eq!(
            config.search.sources,
            vec![SourceKind::SemanticScholar, SourceKind::OpenAlex]
        );
        assert!(!config.search.fallback_on_empty);
        assert_eq!(config.search.deadline(), Some(Duration::from_secs(20)));
        assert_eq!(config.openalex.email.as_deref(), Some("me@example.org"));
        assert_eq!(
            config.openalex.min_interval_or(None),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(200));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert_eq!(config.search.compare_limit, 5);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::from_toml_str("search = = 1").is_err());
        assert!(Config::from_toml_str("[search]\nsources = [\"pubmed\"]").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[arxiv]
timeout_secs = 4
base_url = "http://localhost:9999/"

[semantic_scholar]
enabled = false

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config.arxiv.timeout_or(Duration::from_secs(10)),
            Duration::from_secs(4)
        );
        assert_eq!(
            config.arxiv.base_url_or("https://export.arxiv.org"),
            "http://localhost:9999"
        );
        assert!(!config.semantic_scholar.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/scholar-search.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.semantic_scholar.api_key = Some("saved-key".to_string());
        config.search.sources = vec![SourceKind::OpenAlex];
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded = Config::from_toml_str(&content).unwrap();
        assert_eq!(loaded.semantic_scholar.api_key.as_deref(), Some("saved-key"));
        assert_eq!(loaded.search.sources, vec![SourceKind::OpenAlex]);
    }

    #[test]
    fn test_env_fallbacks_only_fill_gaps() {
        let env: HashMap<&str, &str> = [
            ("OPENALEX_EMAIL", "env@example.org"),
            ("SEMANTIC_SCHOLAR_API_KEY", "env-key"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let mut config = Config::default();
        config.semantic_scholar.api_key = Some("file-key".to_string());
        config.apply_fallbacks_from(lookup);

        assert_eq!(config.openalex.email.as_deref(), Some("env@example.org"));
        assert_eq!(config.semantic_scholar.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_source_defaults() {
        let source = SourceConfig::default();
        assert_eq!(
            source.timeout_or(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
        assert_eq!(source.min_interval_or(None), None);
        assert_eq!(source.base_url_or("https://api.openalex.org"), "https://api.openalex.org");
    }
}
