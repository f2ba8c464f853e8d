//! Configuration loading for keyword-dedupe.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Default config file lives at ~/.config/keyword-dedupe/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// How pairwise similarity between two keywords is scored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMode {
    /// max(text cosine, name cosine); needs text embeddings
    #[default]
    Combined,
    /// Name embeddings only
    NameOnly,
}

impl SimilarityMode {
    /// Threshold used when none is configured.
    pub fn default_threshold(&self) -> f32 {
        match self {
            SimilarityMode::Combined => 0.8,
            SimilarityMode::NameOnly => 0.7,
        }
    }

    /// Whether this mode needs a text embedding for every keyword.
    pub fn requires_text_embedding(&self) -> bool {
        matches!(self, SimilarityMode::Combined)
    }
}

/// What to do with the secondaries of a cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Ask the decider for merge / rename / skip per secondary
    #[default]
    Decide,
    /// Delete every secondary without asking
    Aggressive,
}

/// Keyword store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Supabase PostgREST table
    #[default]
    Supabase,
    /// JSON array file on disk
    Json,
}

/// Keyword store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Supabase project URL (falls back to SUPABASE_URL)
    #[serde(default)]
    pub url: Option<String>,

    /// Service role key (falls back to SUPABASE_SERVICE_ROLE_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table holding keyword rows
    #[serde(default = "default_table")]
    pub table: String,

    /// Path of the JSON file for the `json` backend
    #[serde(default)]
    pub json_path: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    "keywords".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            api_key: None,
            table: default_table(),
            json_path: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_base")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Optional output dimension override
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Per-call timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// HTTP attempts per call (1 = no retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Concurrent embedding tasks
    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_embedding_concurrency() -> usize {
    30
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            model: default_embedding_model(),
            api_key: None,
            dimensions: None,
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
            concurrency: default_embedding_concurrency(),
        }
    }
}

/// Merge decider (LLM) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeciderSettings {
    /// Provider name ("openai" or "anthropic")
    #[serde(default = "default_decider_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_decider_model")]
    pub model: String,

    /// API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL override
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_decider_timeout")]
    pub timeout_secs: u64,

    /// HTTP attempts per decision (1 = no retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_decider_provider() -> String {
    "openai".to_string()
}

fn default_decider_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_decider_timeout() -> u64 {
    60
}

impl Default for DeciderSettings {
    fn default() -> Self {
        Self {
            provider: default_decider_provider(),
            model: default_decider_model(),
            api_key: None,
            base_url: None,
            timeout_secs: default_decider_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Deduplication run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeSettings {
    /// Similarity mode
    #[serde(default)]
    pub mode: SimilarityMode,

    /// Minimum similarity for a candidate pair (default depends on mode)
    #[serde(default)]
    pub threshold: Option<f32>,

    /// Maximum accepted pairs per keyword
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Drop clusters larger than this (unset = uncapped)
    #[serde(default)]
    pub max_cluster_size: Option<usize>,

    /// Maximum keywords fetched per run
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Concurrent cluster merge tasks
    #[serde(default = "default_merge_concurrency")]
    pub merge_concurrency: usize,

    /// Decide per secondary, or delete all secondaries
    #[serde(default)]
    pub strategy: MergeStrategy,

    /// Delete secondaries after a merge
    #[serde(default = "default_true")]
    pub delete_secondaries: bool,

    /// Number of top pairs kept for diagnostics
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Clusters listed in the run summary (unset = all)
    #[serde(default)]
    pub preview_clusters: Option<usize>,

    /// Apply mutations (false = dry run)
    #[serde(default)]
    pub apply: bool,
}

fn default_max_neighbors() -> usize {
    30
}

fn default_fetch_limit() -> usize {
    5000
}

fn default_merge_concurrency() -> usize {
    60
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    20
}

impl Default for DedupeSettings {
    fn default() -> Self {
        Self {
            mode: SimilarityMode::default(),
            threshold: None,
            max_neighbors: default_max_neighbors(),
            max_cluster_size: None,
            fetch_limit: default_fetch_limit(),
            merge_concurrency: default_merge_concurrency(),
            strategy: MergeStrategy::default(),
            delete_secondaries: default_true(),
            top_k: default_top_k(),
            preview_clusters: None,
            apply: false,
        }
    }
}

impl DedupeSettings {
    /// Configured threshold, or the mode's default.
    pub fn effective_threshold(&self) -> f32 {
        self.threshold
            .unwrap_or_else(|| self.mode.default_threshold())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub embeddings: EmbeddingSettings,

    #[serde(default)]
    pub decider: DeciderSettings,

    #[serde(default)]
    pub dedupe: DedupeSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreSettings::default(),
            embeddings: EmbeddingSettings::default(),
            decider: DeciderSettings::default(),
            dedupe: DedupeSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/keyword-dedupe/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DEDUPE_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "keyword-dedupe")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(load_error)?
            .set_default("store.table", default_table())
            .map_err(load_error)?
            .set_default("embeddings.model", default_embedding_model())
            .map_err(load_error)?
            .set_default("decider.provider", default_decider_provider())
            .map_err(load_error)?
            .set_default("decider.model", default_decider_model())
            .map_err(load_error)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DEDUPE_LOG_LEVEL, DEDUPE_DEDUPE__THRESHOLD, DEDUPE_STORE__URL, ...
        builder = builder.add_source(
            Environment::with_prefix("DEDUPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(load_error)?;
        config.try_deserialize().map_err(load_error)
    }

    /// Fill unset secrets from the conventional provider variables.
    pub fn apply_env_fallbacks(&mut self) {
        fn env(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        if self.store.url.is_none() {
            self.store.url = env("SUPABASE_URL");
        }
        if self.store.api_key.is_none() {
            self.store.api_key = env("SUPABASE_SERVICE_ROLE_KEY");
        }
        if self.embeddings.api_key.is_none() {
            self.embeddings.api_key = env("OPENAI_API_KEY");
        }
        if self.decider.api_key.is_none() {
            self.decider.api_key = if self.decider.provider == "anthropic" {
                env("ANTHROPIC_API_KEY")
            } else {
                env("OPENAI_API_KEY")
            };
        }
    }

    /// Validate ranges. Called once at startup, before any mutation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dedupe = &self.dedupe;

        if let Some(threshold) = dedupe.threshold {
            if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::invalid(
                    "dedupe.threshold",
                    format!("must be within 0.0-1.0, got {threshold}"),
                ));
            }
        }
        if dedupe.max_neighbors == 0 {
            return Err(ConfigError::invalid("dedupe.max_neighbors", "must be > 0"));
        }
        if dedupe.fetch_limit == 0 {
            return Err(ConfigError::invalid("dedupe.fetch_limit", "must be > 0"));
        }
        if dedupe.merge_concurrency == 0 {
            return Err(ConfigError::invalid(
                "dedupe.merge_concurrency",
                "must be > 0",
            ));
        }
        if let Some(max) = dedupe.max_cluster_size {
            if max < 2 {
                return Err(ConfigError::invalid(
                    "dedupe.max_cluster_size",
                    format!("must be >= 2, got {max}"),
                ));
            }
        }
        if self.embeddings.concurrency == 0 {
            return Err(ConfigError::invalid("embeddings.concurrency", "must be > 0"));
        }
        if self.embeddings.timeout_secs == 0 {
            return Err(ConfigError::invalid("embeddings.timeout_secs", "must be > 0"));
        }
        if self.decider.timeout_secs == 0 {
            return Err(ConfigError::invalid("decider.timeout_secs", "must be > 0"));
        }
        if !matches!(self.decider.provider.as_str(), "openai" | "anthropic") {
            return Err(ConfigError::invalid(
                "decider.provider",
                format!("unknown provider '{}'", self.decider.provider),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(value: &Option<String>) -> Option<String> {
            value.as_ref().map(|_| "********".to_string())
        }

        let mut copy = self.clone();
        copy.store.api_key = mask(&self.store.api_key);
        copy.embeddings.api_key = mask(&self.embeddings.api_key);
        copy.decider.api_key = mask(&self.decider.api_key);
        copy
    }
}

fn load_error(e: config::ConfigError) -> ConfigError {
    ConfigError::Load(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.store.table, "keywords");
        assert_eq!(settings.embeddings.concurrency, 30);
        assert_eq!(settings.embeddings.timeout_secs, 20);
        assert_eq!(settings.dedupe.merge_concurrency, 60);
        assert_eq!(settings.dedupe.max_neighbors, 30);
        assert!(!settings.dedupe.apply);
        assert!(settings.dedupe.delete_secondaries);
        assert_eq!(settings.dedupe.strategy, MergeStrategy::Decide);
    }

    #[test]
    fn test_effective_threshold_follows_mode() {
        let mut dedupe = DedupeSettings::default();
        assert!((dedupe.effective_threshold() - 0.8).abs() < f32::EPSILON);

        dedupe.mode = SimilarityMode::NameOnly;
        assert!((dedupe.effective_threshold() - 0.7).abs() < f32::EPSILON);

        dedupe.threshold = Some(0.65);
        assert!((dedupe.effective_threshold() - 0.65).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_threshold() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.dedupe.threshold = Some(1.5);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                field: "dedupe.threshold",
                ..
            })
        ));

        settings.dedupe.threshold = Some(f32::NAN);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_limits() {
        let mut settings = Settings::default();
        settings.dedupe.max_neighbors = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.dedupe.max_cluster_size = Some(1);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.embeddings.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.decider.provider = "mystery".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[store]
backend = "json"
json_path = "/tmp/keywords.json"

[dedupe]
mode = "name_only"
threshold = 0.72
strategy = "aggressive"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(&file.path().to_string_lossy())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.store.backend, StoreBackend::Json);
        assert_eq!(settings.store.json_path.as_deref(), Some("/tmp/keywords.json"));
        assert_eq!(settings.dedupe.mode, SimilarityMode::NameOnly);
        assert_eq!(settings.dedupe.strategy, MergeStrategy::Aggressive);
        assert!((settings.dedupe.effective_threshold() - 0.72).abs() < 1e-6);
        // Untouched sections keep their defaults
        assert_eq!(settings.dedupe.max_neighbors, 30);
        assert_eq!(settings.embeddings.model, "text-embedding-3-small");
    }

    #[test]
    fn test_load_missing_cli_file_fails() {
        let result = Settings::load(Some("/definitely/not/here/config.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut settings = Settings::default();
        settings.embeddings.api_key = Some("sk-secret".to_string());
        let redacted = settings.redacted();
        assert_eq!(redacted.embeddings.api_key.as_deref(), Some("********"));
        assert_eq!(redacted.decider.api_key, None);
    }
}
