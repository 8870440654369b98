//! Agentic evaluation: pick metrics from the shape of each item, then add
//! overall retrieval and answer scores.

use crate::config::RagvueConfig;
use crate::error::RagvueError;
use crate::evaluator::Evaluator;
use crate::judge::Judge;
use crate::metrics::{
    ANSWER_COMPLETENESS, ANSWER_RELEVANCE, CLARITY, Metric, MetricRegistry, RETRIEVAL_COVERAGE,
    RETRIEVAL_RELEVANCE, STRICT_FAITHFULNESS,
};
use crate::types::{EvalItem, EvalMode, EvalReport, ItemEvaluation, MetricResult, ReportMeta};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

pub const RETRIEVAL_OVERALL: &str = "retrieval_overall";
pub const ANSWER_OVERALL: &str = "answer_overall";

const RETRIEVAL_METRICS: [&str; 2] = [RETRIEVAL_RELEVANCE, RETRIEVAL_COVERAGE];
const ANSWER_METRICS: [&str; 4] = [
    STRICT_FAITHFULNESS,
    ANSWER_RELEVANCE,
    ANSWER_COMPLETENESS,
    CLARITY,
];

/// Blend weights for `answer_overall`, renormalized over the metrics present.
const ANSWER_WEIGHTS: [(&str, f64); 4] = [
    (STRICT_FAITHFULNESS, 0.50),
    (ANSWER_RELEVANCE, 0.30),
    (ANSWER_COMPLETENESS, 0.15),
    (CLARITY, 0.05),
];

static FACTOID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(who|when|where|which|what|how many|how much)\b").expect("valid factoid regex")
});

/// What an item offers to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProfile {
    pub has_answer: bool,
    pub contexts: usize,
    pub multihop: bool,
    pub factoid: bool,
}

impl ItemProfile {
    pub fn of(item: &EvalItem) -> Self {
        Self {
            has_answer: item.has_answer(),
            contexts: item.non_empty_contexts().len(),
            multihop: looks_multihop(&item.question),
            factoid: looks_factoid(&item.question),
        }
    }

    pub fn has_contexts(&self) -> bool {
        self.contexts > 0
    }
}

pub fn looks_factoid(question: &str) -> bool {
    FACTOID.is_match(&question.trim().to_lowercase())
}

/// Questions that likely need evidence from more than one place.
pub fn looks_multihop(question: &str) -> bool {
    let q = question.trim().to_lowercase();
    q.contains("both") || (q.contains("and") && q.contains(" of ")) || (q.contains("two") && q.contains("sources"))
}

/// Metric names for an item with `profile`, restricted to what `registry` holds.
pub fn choose_metrics(profile: &ItemProfile, registry: &MetricRegistry) -> Vec<String> {
    let mut chosen: Vec<&str> = Vec::new();
    if profile.has_contexts() {
        chosen.extend(RETRIEVAL_METRICS);
    }
    if profile.has_answer {
        chosen.extend(ANSWER_METRICS);
    }
    if profile.multihop && profile.has_contexts() && !chosen.contains(&RETRIEVAL_COVERAGE) {
        chosen.push(RETRIEVAL_COVERAGE);
    }

    let mut names: Vec<String> = Vec::with_capacity(chosen.len());
    for name in chosen {
        if registry.contains(name) && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn score_of(metrics: &[MetricResult], name: &str) -> Option<f64> {
    metrics.iter().find(|m| m.name == name).map(|m| m.score)
}

/// Harmonic mean of retrieval relevance and coverage, or whichever one is present.
pub fn synthesize_retrieval_overall(metrics: &[MetricResult]) -> Option<MetricResult> {
    let relevance = score_of(metrics, RETRIEVAL_RELEVANCE);
    let coverage = score_of(metrics, RETRIEVAL_COVERAGE);

    let (score, explanation) = match (relevance, coverage) {
        (None, None) => return None,
        (Some(r), Some(c)) => {
            let overall = if r == 0.0 || c == 0.0 {
                0.0
            } else {
                2.0 * r * c / (r + c)
            };
            (
                overall,
                format!("Harmonic mean of relevance ({r:.3}) and coverage ({c:.3})."),
            )
        }
        (Some(r), None) => (r, "Only relevance available; used as overall.".to_string()),
        (None, Some(c)) => (c, "Only coverage available; used as overall.".to_string()),
    };

    Some(
        MetricResult::new(RETRIEVAL_OVERALL, score)
            .with_explanation(explanation)
            .with_detail(
                "components",
                json!({
                    RETRIEVAL_RELEVANCE: relevance,
                    RETRIEVAL_COVERAGE: coverage,
                }),
            ),
    )
}

/// Weighted blend of the answer metrics that are present.
pub fn synthesize_answer_overall(metrics: &[MetricResult]) -> Option<MetricResult> {
    let present: Vec<(&str, f64, f64)> = ANSWER_WEIGHTS
        .iter()
        .filter_map(|&(name, weight)| score_of(metrics, name).map(|s| (name, s, weight)))
        .collect();
    if present.is_empty() {
        return None;
    }

    let total_weight: f64 = present.iter().map(|(_, _, w)| w).sum();
    let score: f64 = present
        .iter()
        .map(|(_, s, w)| s * (w / total_weight))
        .sum();

    let parts = present
        .iter()
        .map(|(name, s, _)| format!("{name}={s:.3}"))
        .collect::<Vec<_>>()
        .join(", ");
    let components: Map<String, Value> = present
        .iter()
        .map(|(name, s, _)| (name.to_string(), json!(s)))
        .collect();
    let weights: Map<String, Value> = present
        .iter()
        .map(|(name, _, w)| (name.to_string(), json!(w / total_weight)))
        .collect();

    Some(
        MetricResult::new(ANSWER_OVERALL, score)
            .with_explanation(format!("Weighted blend over available metrics ({parts})."))
            .with_detail("components", Value::Object(components))
            .with_detail("weights_renormed", Value::Object(weights)),
    )
}

/// Chooses and runs metrics per item, then appends the synthesized overall scores.
pub struct AgenticOrchestrator {
    evaluator: Evaluator,
}

impl AgenticOrchestrator {
    pub fn new(judge: Judge, config: &RagvueConfig) -> Result<Self, RagvueError> {
        Ok(Self::from_evaluator(Evaluator::new(judge, config)?))
    }

    pub fn from_evaluator(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate up to `max_items` items (0 means all).
    pub async fn run(&self, items: Vec<EvalItem>, max_items: usize) -> EvalReport {
        let limit = if max_items == 0 { items.len() } else { max_items };
        let items: Vec<EvalItem> = items.into_iter().take(limit).collect();
        info!(items = items.len(), "Starting agentic evaluation");

        let results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| self.run_item(index, item))
            .buffered(self.evaluator.concurrency())
            .collect::<Vec<_>>()
            .await;

        let report = EvalReport::from_results(results).with_meta(ReportMeta::new(
            EvalMode::Agentic,
            self.evaluator.context().default_model(),
        ));
        info!(metrics = report.summary.len(), "Agentic evaluation finished");
        report
    }

    async fn run_item(&self, index: usize, item: EvalItem) -> ItemEvaluation {
        let profile = ItemProfile::of(&item);
        let registry = self.evaluator.registry();
        let chosen = choose_metrics(&profile, registry);
        debug!(
            item = index + 1,
            factoid = profile.factoid,
            multihop = profile.multihop,
            metrics = ?chosen,
            "Chose metrics for item"
        );

        if chosen.is_empty() {
            return ItemEvaluation {
                item,
                metrics: Vec::new(),
                aggregate: Some(0.0),
                eval_time_sec: None,
            };
        }

        let metrics: Vec<Arc<dyn Metric>> =
            chosen.iter().filter_map(|name| registry.get(name)).collect();
        let mut evaluation = self.evaluator.evaluate_item(index, item, &metrics).await;

        let synthesized: Vec<MetricResult> = [
            synthesize_retrieval_overall(&evaluation.metrics),
            synthesize_answer_overall(&evaluation.metrics),
        ]
        .into_iter()
        .flatten()
        .collect();
        evaluation.metrics.extend(synthesized);
        evaluation
    }
}

/// Agentic run with an orchestrator built from `config`.
pub async fn evaluate_agentic(
    judge: Judge,
    config: &RagvueConfig,
    items: Vec<EvalItem>,
    max_items: usize,
) -> Result<EvalReport, RagvueError> {
    Ok(AgenticOrchestrator::new(judge, config)?
        .run(items, max_items)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::judge::MockLlmProvider;
    use pretty_assertions::assert_eq;

    fn registry() -> MetricRegistry {
        MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap()
    }

    fn result(name: &str, score: f64) -> MetricResult {
        MetricResult::new(name, score)
    }

    #[test]
    fn test_profile_detection() {
        let item = EvalItem::new("  Who wrote both novels?")
            .with_answer("  ")
            .with_contexts(["a", "  ", "b"]);
        let profile = ItemProfile::of(&item);
        assert!(!profile.has_answer);
        assert_eq!(profile.contexts, 2);
        assert!(profile.multihop);
        assert!(profile.factoid);
    }

    #[test]
    fn test_multihop_heuristics() {
        assert!(looks_multihop("Compare the capital of France and Spain"));
        assert!(looks_multihop("Combine two sources on this"));
        assert!(!looks_multihop("What is the capital of France?"));
        assert!(!looks_factoid("Explain photosynthesis"));
        assert!(looks_factoid("How many moons does Mars have?"));
    }

    #[test]
    fn test_choose_metrics_by_shape() {
        let registry = registry();
        let full = ItemProfile {
            has_answer: true,
            contexts: 2,
            multihop: true,
            factoid: false,
        };
        assert_eq!(
            choose_metrics(&full, &registry),
            vec![
                RETRIEVAL_RELEVANCE,
                RETRIEVAL_COVERAGE,
                STRICT_FAITHFULNESS,
                ANSWER_RELEVANCE,
                ANSWER_COMPLETENESS,
                CLARITY,
            ]
        );

        let answer_only = ItemProfile {
            contexts: 0,
            ..full.clone()
        };
        assert_eq!(choose_metrics(&answer_only, &registry).len(), 4);

        let empty = ItemProfile {
            has_answer: false,
            contexts: 0,
            multihop: false,
            factoid: false,
        };
        assert!(choose_metrics(&empty, &registry).is_empty());
    }

    #[test]
    fn test_choose_metrics_skips_unregistered() {
        let mut registry = MetricRegistry::new();
        registry
            .register(Arc::new(crate::metrics::Clarity))
            .unwrap();
        let profile = ItemProfile {
            has_answer: true,
            contexts: 1,
            multihop: false,
            factoid: false,
        };
        assert_eq!(choose_metrics(&profile, &registry), vec![CLARITY]);
    }

    #[test]
    fn test_retrieval_overall() {
        let both = synthesize_retrieval_overall(&[
            result(RETRIEVAL_RELEVANCE, 0.5),
            result(RETRIEVAL_COVERAGE, 1.0),
        ])
        .unwrap();
        assert!((both.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            both.explanation.as_deref(),
            Some("Harmonic mean of relevance (0.500) and coverage (1.000).")
        );

        let zero = synthesize_retrieval_overall(&[
            result(RETRIEVAL_RELEVANCE, 0.0),
            result(RETRIEVAL_COVERAGE, 1.0),
        ])
        .unwrap();
        assert_eq!(zero.score, 0.0);

        let only = synthesize_retrieval_overall(&[result(RETRIEVAL_COVERAGE, 0.4)]).unwrap();
        assert_eq!(only.score, 0.4);
        assert_eq!(
            only.explanation.as_deref(),
            Some("Only coverage available; used as overall.")
        );
        assert_eq!(only.details["components"][RETRIEVAL_RELEVANCE], Value::Null);

        assert!(synthesize_retrieval_overall(&[result(CLARITY, 1.0)]).is_none());
    }

    #[test]
    fn test_answer_overall_renormalizes_weights() {
        let overall = synthesize_answer_overall(&[
            result(STRICT_FAITHFULNESS, 1.0),
            result(CLARITY, 0.0),
        ])
        .unwrap();
        // 0.50 / 0.55 of the weight goes to faithfulness
        assert!((overall.score - 0.5 / 0.55).abs() < 1e-9);
        assert_eq!(
            overall.explanation.as_deref(),
            Some("Weighted blend over available metrics (strict_faithfulness=1.000, clarity=0.000).")
        );
        let weights = overall.details["weights_renormed"].as_object().unwrap();
        assert_eq!(weights.len(), 2);

        assert!(synthesize_answer_overall(&[result(RETRIEVAL_RELEVANCE, 1.0)]).is_none());
    }

    #[tokio::test]
    async fn test_run_appends_overall_metrics_and_respects_max_items() {
        let mock = Arc::new(MockLlmProvider::with_responder(|req| {
            let prompt = &req.messages[1].content;
            let reply = if prompt.contains("Metric: answer relevance") {
                r#"{"score": 1.0}"#
            } else if prompt.contains("Metric: clarity") {
                r#"{"score": 0.5}"#
            } else {
                "{}"
            };
            Ok(reply.to_string())
        }));
        let judge = Judge::new(
            mock,
            RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
        );
        let orchestrator = AgenticOrchestrator::new(judge, &RagvueConfig::default()).unwrap();

        let items = vec![
            EvalItem::new("Who wrote 1984?")
                .with_answer("George Orwell")
                .with_aspects(["author"]),
            EvalItem::new("Nothing to score"),
            EvalItem::new("never evaluated").with_answer("x"),
        ];
        let report = orchestrator.run(items, 2).await;
        assert_eq!(report.results.len(), 2);

        let first = &report.results[0];
        let names: Vec<&str> = first.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                STRICT_FAITHFULNESS,
                ANSWER_RELEVANCE,
                ANSWER_COMPLETENESS,
                CLARITY,
                ANSWER_OVERALL,
            ]
        );
        // aggregate covers the base metrics only
        assert!((first.aggregate.unwrap() - 0.375).abs() < 1e-9);
        assert!((first.metric(ANSWER_OVERALL).unwrap().score - 0.325).abs() < 1e-9);

        let second = &report.results[1];
        assert!(second.metrics.is_empty());
        assert_eq!(second.aggregate, Some(0.0));

        assert!(report.summary.contains_key(ANSWER_OVERALL));
        assert_eq!(report.meta.unwrap().mode, EvalMode::Agentic);
    }
}
