//! Command implementations.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use keyword_dedupe::{Decider, DedupePipeline, LlmDecider, LlmDeciderConfig, PipelineConfig, RunSummary};
use keyword_embeddings::{EmbeddingProvider, OpenAiEmbedder, OpenAiEmbedderConfig};
use keyword_store::{JsonFileStore, KeywordStore, SupabaseConfig, SupabaseStore};
use keyword_types::{ConfigError, MergeStrategy, Settings, SimilarityMode, StoreBackend};

use crate::cli::{RunArgs, StoreArg};

/// Load settings from file and environment, then apply the global flags.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    settings.apply_env_fallbacks();
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Apply `run` flags on top of loaded settings (highest precedence).
pub fn apply_run_overrides(settings: &mut Settings, args: &RunArgs) {
    let dedupe = &mut settings.dedupe;
    if args.apply {
        dedupe.apply = true;
    }
    if let Some(threshold) = args.threshold {
        dedupe.threshold = Some(threshold);
    }
    if let Some(max_neighbors) = args.max_neighbors {
        dedupe.max_neighbors = max_neighbors;
    }
    if args.aggressive {
        dedupe.strategy = MergeStrategy::Aggressive;
    }
    if args.name_only {
        dedupe.mode = SimilarityMode::NameOnly;
    }
    if let Some(limit) = args.limit {
        dedupe.fetch_limit = limit;
    }
    if let Some(max) = args.max_cluster_size {
        dedupe.max_cluster_size = Some(max);
    }
    if args.keep_secondaries {
        dedupe.delete_secondaries = false;
    }

    match args.store {
        Some(StoreArg::Supabase) => settings.store.backend = StoreBackend::Supabase,
        Some(StoreArg::Json) => settings.store.backend = StoreBackend::Json,
        None => {}
    }
    if let Some(input) = &args.input {
        settings.store.backend = StoreBackend::Json;
        settings.store.json_path = Some(input.clone());
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run one dedupe pass.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Validate, before anything touches the store
/// 3. Build store, embedder and (when merging with decisions) the decider
/// 4. Run the pipeline and print the summary
pub async fn run_dedupe(
    config_path: Option<&str>,
    log_level: Option<&str>,
    args: RunArgs,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level)?;
    apply_run_overrides(&mut settings, &args);

    init_tracing(&settings.log_level)?;
    settings.validate().context("Invalid configuration")?;

    info!(
        backend = ?settings.store.backend,
        mode = ?settings.dedupe.mode,
        strategy = ?settings.dedupe.strategy,
        threshold = settings.dedupe.effective_threshold(),
        apply = settings.dedupe.apply,
        "keyword-dedupe starting"
    );

    let store = build_store(&settings).await?;
    let embedder = build_embedder(&settings)?;
    let decider = build_decider(&settings)?;

    let pipeline = DedupePipeline::new(
        store,
        embedder,
        decider,
        PipelineConfig::from_settings(&settings),
    )
    .context("Failed to set up pipeline")?;

    let summary = pipeline.run().await.context("Dedupe run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

/// Print the effective configuration.
pub fn show_config(config_path: Option<&str>, log_level: Option<&str>) -> Result<()> {
    let settings = load_settings(config_path, log_level)?;
    print!("{}", render_config(&settings)?);
    Ok(())
}

/// Settings as TOML with API keys masked.
pub fn render_config(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(&settings.redacted()).context("Failed to serialize configuration")
}

/// Open the configured keyword store.
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn KeywordStore>> {
    let store = &settings.store;
    match store.backend {
        StoreBackend::Supabase => {
            let url = store.url.clone().ok_or(ConfigError::Missing("store.url"))?;
            let key = store
                .api_key
                .clone()
                .ok_or(ConfigError::Missing("store.api_key"))?;
            let config = SupabaseConfig::new(url, key)
                .with_table(store.table.clone())
                .with_timeout(Duration::from_secs(store.timeout_secs));
            let supabase = SupabaseStore::new(config).context("Failed to create Supabase client")?;
            Ok(Arc::new(supabase))
        }
        StoreBackend::Json => {
            let path = store
                .json_path
                .as_deref()
                .ok_or(ConfigError::Missing("store.json_path"))?;
            let json = JsonFileStore::open(path)
                .await
                .with_context(|| format!("Failed to open keyword file {path}"))?;
            Ok(Arc::new(json))
        }
    }
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let embeddings = &settings.embeddings;
    let key = embeddings
        .api_key
        .clone()
        .ok_or(ConfigError::Missing("embeddings.api_key"))?;
    let config = OpenAiEmbedderConfig::openai(key, embeddings.model.clone())
        .with_base_url(embeddings.base_url.clone())
        .with_dimensions(embeddings.dimensions)
        .with_timeout(Duration::from_secs(embeddings.timeout_secs))
        .with_max_retries(embeddings.max_retries);
    let embedder = OpenAiEmbedder::new(config).context("Failed to create embedding client")?;
    Ok(Arc::new(embedder))
}

/// The decider is only built for applying runs with the `decide` strategy.
fn build_decider(settings: &Settings) -> Result<Option<Arc<dyn Decider>>> {
    if !settings.dedupe.apply || settings.dedupe.strategy == MergeStrategy::Aggressive {
        return Ok(None);
    }

    let decider = &settings.decider;
    let key = decider
        .api_key
        .clone()
        .ok_or(ConfigError::Missing("decider.api_key"))?;
    let mut config = if decider.provider == "anthropic" {
        LlmDeciderConfig::claude(key, decider.model.clone())
    } else {
        LlmDeciderConfig::openai(key, decider.model.clone())
    };
    if let Some(base_url) = &decider.base_url {
        config = config.with_base_url(base_url.clone());
    }
    config = config
        .with_timeout(Duration::from_secs(decider.timeout_secs))
        .with_max_retries(decider.max_retries);

    let llm = LlmDecider::new(config).context("Failed to create decider client")?;
    Ok(Some(Arc::new(llm)))
}

/// Human-readable run report.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let mode = if summary.dry_run { "dry run" } else { "applied" };

    let _ = writeln!(out, "Run {} ({mode})", summary.run_id);
    let _ = writeln!(out, "  Keywords fetched:     {}", summary.keywords_fetched);
    let _ = writeln!(
        out,
        "  Embeddings computed:  {} ({} failed)",
        summary.embeddings_computed, summary.embedding_failures
    );
    let _ = writeln!(out, "  Pairs compared:       {}", summary.candidates);
    let _ = writeln!(out, "  Candidate pairs:      {}", summary.pairs);
    let _ = writeln!(out, "  Clusters:             {}", summary.clusters);

    if !summary.dry_run {
        let _ = writeln!(out, "  Clusters merged:      {}", summary.clusters_merged);
        let _ = writeln!(out, "  Keywords deleted:     {}", summary.keywords_deleted);
        let _ = writeln!(
            out,
            "  Keywords renamed:     {} ({} no-op)",
            summary.keywords_renamed, summary.rename_noops
        );
        let _ = writeln!(out, "  Decisions skipped:    {}", summary.decisions_skipped);
        let _ = writeln!(
            out,
            "  Failures:             {} decision, {} mutation",
            summary.decision_failures, summary.mutation_failures
        );
    }

    if !summary.top_pairs.is_empty() {
        let _ = writeln!(out, "\nTop pairs:");
        for pair in &summary.top_pairs {
            let _ = writeln!(out, "  {:.4}  #{} <-> #{}", pair.score, pair.a, pair.b);
        }
    }

    if !summary.cluster_preview.is_empty() {
        let _ = writeln!(out, "\nClusters:");
        for cluster in &summary.cluster_preview {
            let _ = writeln!(out, "  #{}  {}", cluster.primary, cluster.names.join(" | "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyword_dedupe::{ClusterPreview, SimilarityPair};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_run_overrides() {
        let mut settings = Settings::default();
        let args = RunArgs {
            apply: true,
            threshold: Some(0.9),
            aggressive: true,
            name_only: true,
            limit: Some(50),
            keep_secondaries: true,
            ..Default::default()
        };
        apply_run_overrides(&mut settings, &args);

        assert!(settings.dedupe.apply);
        assert_eq!(settings.dedupe.threshold, Some(0.9));
        assert_eq!(settings.dedupe.strategy, MergeStrategy::Aggressive);
        assert_eq!(settings.dedupe.mode, SimilarityMode::NameOnly);
        assert_eq!(settings.dedupe.fetch_limit, 50);
        assert!(!settings.dedupe.delete_secondaries);
        assert_eq!(settings.store.backend, StoreBackend::Supabase);
    }

    #[test]
    fn test_input_implies_json_backend() {
        let mut settings = Settings::default();
        let args = RunArgs {
            input: Some("kw.json".to_string()),
            ..Default::default()
        };
        apply_run_overrides(&mut settings, &args);
        assert_eq!(settings.store.backend, StoreBackend::Json);
        assert_eq!(settings.store.json_path.as_deref(), Some("kw.json"));
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let mut settings = Settings::default();
        settings.dedupe.max_neighbors = 12;
        apply_run_overrides(&mut settings, &RunArgs::default());
        assert_eq!(settings.dedupe.max_neighbors, 12);
        assert!(!settings.dedupe.apply);
    }

    #[test]
    fn test_render_config_redacts_keys() {
        let mut settings = Settings::default();
        settings.embeddings.api_key = Some("sk-secret".to_string());
        let rendered = render_config(&settings).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("********"));
        assert!(rendered.contains("[dedupe]"));
    }

    #[test]
    fn test_decider_not_built_for_dry_run_or_aggressive() {
        let settings = Settings::default();
        assert!(build_decider(&settings).unwrap().is_none());

        let mut settings = Settings::default();
        settings.dedupe.apply = true;
        settings.dedupe.strategy = MergeStrategy::Aggressive;
        assert!(build_decider(&settings).unwrap().is_none());
    }

    #[test]
    fn test_decider_requires_key_when_applying() {
        let mut settings = Settings::default();
        settings.dedupe.apply = true;
        settings.decider.api_key = None;
        assert!(build_decider(&settings).is_err());

        settings.decider.api_key = Some("k".to_string());
        assert!(build_decider(&settings).unwrap().is_some());
    }

    #[test]
    fn test_embedder_requires_key() {
        let settings = Settings::default();
        let err = build_embedder(&settings).err().unwrap();
        assert!(err.to_string().contains("embeddings.api_key"));
    }

    #[tokio::test]
    async fn test_build_json_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 1, "name": "Rust"}}]"#).unwrap();

        let mut settings = Settings::default();
        settings.store.backend = StoreBackend::Json;
        settings.store.json_path = Some(file.path().to_string_lossy().into_owned());

        let store = build_store(&settings).await.unwrap();
        let rows = store.fetch(&Default::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Rust");
    }

    #[tokio::test]
    async fn test_supabase_store_requires_url() {
        let mut settings = Settings::default();
        settings.store.url = None;
        assert!(build_store(&settings).await.is_err());
    }

    #[test]
    fn test_render_summary() {
        let mut summary = RunSummary::new(true);
        summary.keywords_fetched = 3;
        summary.top_pairs = vec![SimilarityPair::new(2, 1, 0.95)];
        summary.cluster_preview = vec![ClusterPreview {
            primary: 1,
            members: vec![1, 2],
            names: vec!["Trump".to_string(), "Donald Trump".to_string()],
        }];

        let text = render_summary(&summary);
        assert!(text.contains("(dry run)"));
        assert!(text.contains("Keywords fetched:     3"));
        assert!(text.contains("0.9500  #1 <-> #2"));
        assert!(text.contains("#1  Trump | Donald Trump"));
        assert!(!text.contains("Clusters merged"));
    }

    #[test]
    fn test_render_summary_applied() {
        let mut summary = RunSummary::new(false);
        summary.keywords_deleted = 4;
        let text = render_summary(&summary);
        assert!(text.contains("(applied)"));
        assert!(text.contains("Keywords deleted:     4"));
    }
}
