//! Configuration system for RAGVue.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/ragvue/config.toml` and/or `.ragvue/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use crate::providers::SUPPORTED_PROVIDERS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Model used by every judge call unless a metric override says otherwise.
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o-mini";

/// Top-level configuration for RAGVue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagvueConfig {
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub eval: EvalConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Judge provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Provider name. Only "openai" (and compatible endpoints) is supported.
    pub provider: String,
    /// Default judge model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Default sampling temperature for judge calls.
    pub temperature: f32,
    /// Optional cap on generated tokens per judge call.
    pub max_tokens: Option<usize>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: DEFAULT_JUDGE_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for transient judge errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Per-metric judge settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Keyed by metric name, e.g. `strict_faithfulness`.
    pub overrides: BTreeMap<String, MetricOverride>,
    /// Model used to extract aspects from questions.
    pub aspects_model: Option<String>,
    /// Minimum per-chunk relevance counted as relevant.
    pub retrieval_relevance_threshold: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            aspects_model: None,
            retrieval_relevance_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Base metrics exposed as `calibration_<name>`.
    pub targets: Vec<String>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                "strict_faithfulness".to_string(),
                "answer_completeness".to_string(),
                "retrieval_coverage".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Number of items evaluated at once.
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Formats written by `eval`, `agentic` and `run` when `--formats` is not given.
    pub formats: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            formats: ["json", "md", "csv", "html"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ReportConfig {
    pub fn formats_string(&self) -> String {
        self.formats.join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub concurrency: Option<usize>,
}

/// Environment variable prefixes for per-metric judge settings, as
/// `(metric name, prefix)`. `<PREFIX>_MODEL` and `<PREFIX>_TEMPERATURE` are read.
const METRIC_ENV_PREFIXES: &[(&str, &str)] = &[
    ("retrieval_relevance", "RETRIEVAL_RELEVANCE"),
    ("retrieval_coverage", "RETRIEVAL_COVERAGE"),
    ("strict_faithfulness", "FAITHFULNESS"),
    ("answer_relevance", "ANSWER_RELEVANCE"),
    ("answer_completeness", "ANSWER_COMPLETENESS"),
    ("clarity", "CLARITY"),
];

impl RagvueConfig {
    /// Apply the plain (unprefixed) environment variables understood by the
    /// judge prompts: `OPENAI_BASE_URL`, `RETRIEVAL_RELEVANCE_THRESHOLD`,
    /// `ASPECTS_MODEL` and `<METRIC>_MODEL` / `<METRIC>_TEMPERATURE`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("OPENAI_BASE_URL") {
            self.judge.base_url = Some(url.trim().to_string());
        }
        if let Some(thr) = get("RETRIEVAL_RELEVANCE_THRESHOLD") {
            match thr.trim().parse::<f64>() {
                Ok(v) => self.metrics.retrieval_relevance_threshold = v,
                Err(_) => tracing::warn!(value = %thr, "Ignoring invalid RETRIEVAL_RELEVANCE_THRESHOLD"),
            }
        }
        if let Some(model) = get("ASPECTS_MODEL") {
            self.metrics.aspects_model = Some(model.trim().to_string());
        }

        for (metric, prefix) in METRIC_ENV_PREFIXES {
            let model = get(&format!("{prefix}_MODEL"));
            let temperature = get(&format!("{prefix}_TEMPERATURE"))
                .and_then(|t| t.trim().parse::<f32>().ok());
            if model.is_none() && temperature.is_none() {
                continue;
            }
            let entry = self.metrics.overrides.entry(metric.to_string()).or_default();
            if let Some(m) = model {
                entry.model = Some(m.trim().to_string());
            }
            if let Some(t) = temperature {
                entry.temperature = Some(t);
            }
        }
    }

    /// Apply command line overrides.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref model) = overrides.model {
            self.judge.model = model.clone();
        }
        if let Some(ref url) = overrides.base_url {
            self.judge.base_url = Some(url.clone());
        }
        if let Some(concurrency) = overrides.concurrency {
            self.eval.concurrency = concurrency;
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=2.0).contains(&self.judge.temperature) {
            warnings.push(format!(
                "judge.temperature is {} (expected 0.0-2.0)",
                self.judge.temperature
            ));
        }
        for (name, ov) in &self.metrics.overrides {
            if let Some(t) = ov.temperature
                && !(0.0..=2.0).contains(&t)
            {
                warnings.push(format!(
                    "metrics.overrides.{name}.temperature is {t} (expected 0.0-2.0)"
                ));
            }
        }
        let thr = self.metrics.retrieval_relevance_threshold;
        if !(0.0..=1.0).contains(&thr) {
            warnings.push(format!(
                "metrics.retrieval_relevance_threshold is {thr}; it will be clamped to [0, 1]"
            ));
        }
        if self.eval.concurrency == 0 {
            warnings.push("eval.concurrency is 0; items will be evaluated one at a time".to_string());
        }
        if !SUPPORTED_PROVIDERS.contains(&self.judge.provider.as_str()) {
            warnings.push(format!(
                "judge.provider '{}' is not supported (expected one of: {})",
                self.judge.provider,
                SUPPORTED_PROVIDERS.join(", ")
            ));
        }

        warnings
    }
}

/// Load configuration with layered merging.
///
/// Priority (highest first):
/// 1. Explicit overrides (passed as argument)
/// 2. Unprefixed judge variables (`FAITHFULNESS_MODEL`, `OPENAI_BASE_URL`, ...)
/// 3. Environment variables (prefixed with `RAGVUE_`)
/// 4. Workspace-local config (`.ragvue/config.toml`)
/// 5. User config (`~/.config/ragvue/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<RagvueConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RagvueConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RAGVUE_JUDGE__MODEL, RAGVUE_EVAL__CONCURRENCY, etc.
    figment = figment.merge(Env::prefixed("RAGVUE_").split("__"));

    let mut config: RagvueConfig = figment.extract().map_err(Box::new)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());

    if let Some(overrides) = overrides {
        config.apply_overrides(overrides);
    }

    Ok(config)
}

/// `~/.config/ragvue/config.toml` (platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ragvue", "ragvue")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<workspace>/.ragvue/config.toml`.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ragvue").join("config.toml")
}

/// Check whether any RAGVue configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write `config` to `<workspace>/.ragvue/config.toml`, creating the directory.
/// Returns the path written.
pub fn write_workspace_config(
    workspace: &Path,
    config: &RagvueConfig,
) -> Result<PathBuf, crate::error::ConfigError> {
    let path = workspace_config_path(workspace);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::ConfigError::Load {
            message: format!("cannot create {}: {e}", parent.display()),
        })?;
    }
    let body = toml::to_string_pretty(config).map_err(|e| crate::error::ConfigError::Validation {
        message: e.to_string(),
    })?;
    std::fs::write(&path, body).map_err(|e| crate::error::ConfigError::Load {
        message: format!("cannot write {}: {e}", path.display()),
    })?;
    Ok(path)
}
