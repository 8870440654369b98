//! Metric registry: named scoring procedures backed by the judge.
//!
//! Every metric implements [`Metric`]. Manual mode looks metrics up by name
//! through [`MetricRegistry::select`]; agentic mode picks them from item shape.

pub mod answer_completeness;
pub mod answer_relevance;
pub mod calibration;
pub mod clarity;
pub mod retrieval_coverage;
pub mod retrieval_relevance;
pub mod strict_faithfulness;

use crate::config::{MetricOverride, MetricsConfig, RagvueConfig};
use crate::error::MetricError;
use crate::judge::Judge;
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use answer_completeness::AnswerCompleteness;
pub use answer_relevance::AnswerRelevance;
pub use calibration::{Calibration, JudgeVariant};
pub use clarity::Clarity;
pub use retrieval_coverage::RetrievalCoverage;
pub use retrieval_relevance::RetrievalRelevance;
pub use strict_faithfulness::StrictFaithfulness;

pub const RETRIEVAL_RELEVANCE: &str = "retrieval_relevance";
pub const RETRIEVAL_COVERAGE: &str = "retrieval_coverage";
pub const STRICT_FAITHFULNESS: &str = "strict_faithfulness";
pub const ANSWER_RELEVANCE: &str = "answer_relevance";
pub const ANSWER_COMPLETENESS: &str = "answer_completeness";
pub const CLARITY: &str = "clarity";

/// The six judge-backed base metrics, in registry order.
pub const BASE_METRICS: [&str; 6] = [
    RETRIEVAL_RELEVANCE,
    RETRIEVAL_COVERAGE,
    STRICT_FAITHFULNESS,
    ANSWER_RELEVANCE,
    ANSWER_COMPLETENESS,
    CLARITY,
];

/// Trait that all metrics must implement.
#[async_trait]
pub trait Metric: Send + Sync {
    /// The unique name of this metric.
    fn name(&self) -> &str;

    /// Human-readable description of what this metric measures.
    fn description(&self) -> &str;

    /// Score one item.
    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError>;
}

/// Judge handle plus per-metric settings passed to every metric call.
#[derive(Debug, Clone)]
pub struct MetricContext {
    judge: Judge,
    config: MetricsConfig,
    default_model: String,
    default_temperature: f32,
}

impl MetricContext {
    pub fn new(judge: Judge, config: &RagvueConfig) -> Self {
        Self {
            judge,
            config: config.metrics.clone(),
            default_model: config.judge.model.clone(),
            default_temperature: config.judge.temperature,
        }
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Model for `metric`: its override, else the judge default.
    pub fn model_for(&self, metric: &str) -> String {
        self.config
            .overrides
            .get(metric)
            .and_then(|o| o.model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Temperature for `metric`: its override, else the judge default.
    pub fn temperature_for(&self, metric: &str) -> f32 {
        self.config
            .overrides
            .get(metric)
            .and_then(|o| o.temperature)
            .unwrap_or(self.default_temperature)
    }

    /// Model used for aspect extraction.
    pub fn aspects_model(&self) -> String {
        self.config
            .aspects_model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Derived context where `metric` runs under the given model and temperature.
    pub fn with_judge_settings(&self, metric: &str, model: &str, temperature: f32) -> Self {
        let mut derived = self.clone();
        derived.config.overrides.insert(
            metric.to_string(),
            MetricOverride {
                model: Some(model.to_string()),
                temperature: Some(temperature),
            },
        );
        derived
    }
}

/// Run `metric` on `item`, turning an error into a score-0 result.
pub async fn run_metric(
    metric: &dyn Metric,
    ctx: &MetricContext,
    item: &EvalItem,
) -> MetricResult {
    let outcome = metric.evaluate(ctx, item).await.and_then(|result| {
        if result.score.is_finite() {
            Ok(result)
        } else {
            Err(MetricError::InvalidVerdict {
                metric: metric.name().to_string(),
                message: format!("score {} is not a finite number", result.score),
            })
        }
    });
    match outcome {
        Ok(mut result) => {
            result.name = metric.name().to_string();
            result
        }
        Err(e) => {
            warn!(metric = %metric.name(), error = %e, "Metric failed; scoring 0");
            let message = match e {
                MetricError::Llm(llm) => format!("LLM error: {llm}"),
                other => other.to_string(),
            };
            MetricResult::failed(metric.name(), message)
        }
    }
}

/// The metric registry holds all registered metrics keyed by name.
pub struct MetricRegistry {
    metrics: BTreeMap<String, Arc<dyn Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            metrics: BTreeMap::new(),
        }
    }

    /// Registry with the six base metrics and the configured calibration metrics.
    pub fn with_defaults(config: &RagvueConfig) -> Result<Self, MetricError> {
        let mut registry = Self::new();
        for metric in base_metrics() {
            registry.register(metric)?;
        }
        for target in &config.calibration.targets {
            let base = registry
                .get(target)
                .filter(|_| BASE_METRICS.contains(&target.as_str()))
                .ok_or_else(|| MetricError::UnknownMetric {
                    name: target.clone(),
                    available: BASE_METRICS.iter().map(|s| s.to_string()).collect(),
                })?;
            registry.register(Arc::new(Calibration::for_target(base)))?;
        }
        Ok(registry)
    }

    /// Register a metric. Returns error if a metric with the same name is already registered.
    pub fn register(&mut self, metric: Arc<dyn Metric>) -> Result<(), MetricError> {
        let name = metric.name().to_string();
        if self.metrics.contains_key(&name) {
            return Err(MetricError::AlreadyRegistered { name });
        }
        debug!(metric = %name, "Registering metric");
        self.metrics.insert(name, metric);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// All registered metric names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.metrics.keys().cloned().collect()
    }

    /// `(name, description)` pairs, sorted by name.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.metrics
            .iter()
            .map(|(name, m)| (name.clone(), m.description().to_string()))
            .collect()
    }

    /// Resolve requested names. An empty request selects every metric.
    pub fn select<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<Arc<dyn Metric>>, MetricError> {
        if requested.iter().all(|r| r.as_ref().trim().is_empty()) {
            return Ok(self.metrics.values().cloned().collect());
        }
        let mut selected: Vec<Arc<dyn Metric>> = Vec::new();
        for name in requested.iter().map(|r| r.as_ref().trim()).filter(|r| !r.is_empty()) {
            let metric = self.get(name).ok_or_else(|| MetricError::UnknownMetric {
                name: name.to_string(),
                available: self.names(),
            })?;
            if !selected.iter().any(|m| m.name() == name) {
                selected.push(metric);
            }
        }
        Ok(selected)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn base_metrics() -> Vec<Arc<dyn Metric>> {
    vec![
        Arc::new(RetrievalRelevance),
        Arc::new(RetrievalCoverage),
        Arc::new(StrictFaithfulness),
        Arc::new(AnswerRelevance),
        Arc::new(AnswerCompleteness),
        Arc::new(Clarity),
    ]
}

/// Numbered document block shared by the retrieval prompts.
pub(crate) fn format_documents(contexts: &[String]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[Doc {}] {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n\n")
}


#[cfg(test)]
mod tests {
    use super::test_support::context_with;
    use super::*;
    use crate::error::LlmError;
    use crate::judge::MockLlmProvider;

    struct Fixed;

    #[async_trait]
    impl Metric for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "Always 0.5"
        }

        async fn evaluate(
            &self,
            _ctx: &MetricContext,
            _item: &EvalItem,
        ) -> Result<MetricResult, MetricError> {
            Ok(MetricResult::new("something-else", 0.5))
        }
    }

    struct Failing;

    #[async_trait]
    impl Metric for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always errors"
        }

        async fn evaluate(
            &self,
            _ctx: &MetricContext,
            _item: &EvalItem,
        ) -> Result<MetricResult, MetricError> {
            Err(LlmError::Timeout { timeout_secs: 3 }.into())
        }
    }

    #[test]
    fn test_default_registry_names() {
        let registry = MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "answer_completeness",
                "answer_relevance",
                "calibration_answer_completeness",
                "calibration_retrieval_coverage",
                "calibration_strict_faithfulness",
                "clarity",
                "retrieval_coverage",
                "retrieval_relevance",
                "strict_faithfulness",
            ]
        );
    }

    #[test]
    fn test_registry_rejects_unknown_calibration_target() {
        let mut config = RagvueConfig::default();
        config.calibration.targets = vec!["bleu".to_string()];
        let err = MetricRegistry::with_defaults(&config).err().unwrap();
        assert!(matches!(err, MetricError::UnknownMetric { .. }));
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = MetricRegistry::new();
        registry.register(Arc::new(Fixed)).unwrap();
        let err = registry.register(Arc::new(Fixed)).unwrap_err();
        assert!(matches!(err, MetricError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_select_empty_means_all() {
        let registry = MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap();
        let none: [&str; 0] = [];
        assert_eq!(registry.select(&none).unwrap().len(), registry.len());
        assert_eq!(registry.select(&[" "]).unwrap().len(), registry.len());
    }

    #[test]
    fn test_select_keeps_request_order_and_dedupes() {
        let registry = MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap();
        let selected = registry
            .select(&["clarity", "answer_relevance", "clarity"])
            .unwrap();
        let names: Vec<&str> = selected.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["clarity", "answer_relevance"]);
    }

    #[test]
    fn test_select_unknown_is_error() {
        let registry = MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap();
        let err = registry.select(&["clarity", "rouge"]).err().unwrap();
        assert!(err.to_string().contains("rouge"));
    }

    #[test]
    fn test_context_resolves_overrides() {
        let mut config = RagvueConfig::default();
        config.metrics.overrides.insert(
            "clarity".to_string(),
            MetricOverride {
                model: Some("gpt-4o".to_string()),
                temperature: None,
            },
        );
        let ctx = MetricContext::new(
            Judge::new(Arc::new(MockLlmProvider::new()), Default::default()),
            &config,
        );
        assert_eq!(ctx.model_for("clarity"), "gpt-4o");
        assert_eq!(ctx.temperature_for("clarity"), 0.0);
        assert_eq!(ctx.model_for("answer_relevance"), "gpt-4o-mini");
        assert_eq!(ctx.aspects_model(), "gpt-4o-mini");

        let derived = ctx.with_judge_settings("answer_relevance", "gpt-4.1-mini", 0.3);
        assert_eq!(derived.model_for("answer_relevance"), "gpt-4.1-mini");
        assert_eq!(derived.temperature_for("answer_relevance"), 0.3);
        // original untouched
        assert_eq!(ctx.model_for("answer_relevance"), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_run_metric_normalizes_name_and_converts_errors() {
        let ctx = context_with(Arc::new(MockLlmProvider::new()));
        let item = EvalItem::new("q");

        let ok = run_metric(&Fixed, &ctx, &item).await;
        assert_eq!(ok.name, "fixed");
        assert_eq!(ok.score, 0.5);

        let failed = run_metric(&Failing, &ctx, &item).await;
        assert_eq!(failed.name, "failing");
        assert_eq!(failed.score, 0.0);
        assert_eq!(
            failed.error.as_deref(),
            Some("LLM error: Request timed out after 3s")
        );
    }

    struct NotANumber;

    #[async_trait]
    impl Metric for NotANumber {
        fn name(&self) -> &str {
            "nan"
        }

        fn description(&self) -> &str {
            "Returns NaN"
        }

        async fn evaluate(
            &self,
            _ctx: &MetricContext,
            _item: &EvalItem,
        ) -> Result<MetricResult, MetricError> {
            Ok(MetricResult::new("nan", f64::NAN))
        }
    }

    #[tokio::test]
    async fn test_run_metric_rejects_non_finite_scores() {
        let ctx = context_with(Arc::new(MockLlmProvider::new()));
        let result = run_metric(&NotANumber, &ctx, &EvalItem::new("q")).await;
        assert_eq!(result.score, 0.0);
        assert!(result.error.unwrap().contains("invalid verdict"));
    }

    #[test]
    fn test_format_documents() {
        let docs = format_documents(&["alpha".to_string(), "beta".to_string()]);
        assert_eq!(docs, "[Doc 1] alpha\n\n[Doc 2] beta");
    }
}
