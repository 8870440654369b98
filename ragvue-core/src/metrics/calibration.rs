//! Judge calibration: agreement of one metric across a panel of judge
//! models and temperatures.
//!
//! Each panel member runs the target metric under its own settings. The score is
//! `1 - (max - min)` over the members that produced a verdict.

use super::{
    ANSWER_COMPLETENESS, ANSWER_RELEVANCE, CLARITY, Metric, MetricContext, RETRIEVAL_COVERAGE,
    RETRIEVAL_RELEVANCE, STRICT_FAITHFULNESS,
};
use crate::error::MetricError;
use crate::parse::clip01;
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

/// One judge configuration in a calibration panel.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVariant {
    pub name: String,
    pub model: String,
    pub temperature: f32,
}

impl JudgeVariant {
    pub fn new(name: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            temperature,
        }
    }

    /// The six-member panel: four gpt-4o-mini runs and two gpt-4.1-mini runs.
    pub fn standard_panel(prefix: &str) -> Vec<JudgeVariant> {
        [
            ("gpt4omini_t00_run1", "gpt-4o-mini", 0.0),
            ("gpt4omini_t00_run2", "gpt-4o-mini", 0.0),
            ("gpt4omini_t20", "gpt-4o-mini", 0.2),
            ("gpt4omini_t50", "gpt-4o-mini", 0.5),
            ("gpt41mini_t00", "gpt-4.1-mini", 0.0),
            ("gpt41mini_t30", "gpt-4.1-mini", 0.3),
        ]
        .into_iter()
        .map(|(suffix, model, temperature)| {
            JudgeVariant::new(format!("{prefix}_{suffix}"), model, temperature)
        })
        .collect()
    }
}

/// Short prefix used in panel member names.
pub fn panel_prefix(metric: &str) -> &str {
    match metric {
        STRICT_FAITHFULNESS => "sf",
        ANSWER_COMPLETENESS => "ac",
        ANSWER_RELEVANCE => "ar",
        CLARITY => "cl",
        RETRIEVAL_COVERAGE => "rc",
        RETRIEVAL_RELEVANCE => "rr",
        other => other,
    }
}

pub struct Calibration {
    name: String,
    description: String,
    target: Arc<dyn Metric>,
    judges: Vec<JudgeVariant>,
}

impl Calibration {
    /// Calibration of `target` with the standard panel, named `calibration_<target>`.
    pub fn for_target(target: Arc<dyn Metric>) -> Self {
        let target_name = target.name().to_string();
        Self {
            name: format!("calibration_{target_name}"),
            description: format!("Agreement of {target_name} across judge models and temperatures"),
            judges: JudgeVariant::standard_panel(panel_prefix(&target_name)),
            target,
        }
    }

    pub fn with_judges(mut self, judges: Vec<JudgeVariant>) -> Self {
        self.judges = judges;
        self
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    pub fn judges(&self) -> &[JudgeVariant] {
        &self.judges
    }
}

#[async_trait]
impl Metric for Calibration {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError> {
        let target = self.target_name();
        let mut sub_scores = Map::new();
        let mut judge_outputs = Map::new();
        let mut errors = Map::new();
        let mut scores = Vec::new();

        for judge in &self.judges {
            let derived = ctx.with_judge_settings(target, &judge.model, judge.temperature);
            match self.target.evaluate(&derived, item).await {
                Ok(result) if result.error.is_none() => {
                    let score = clip01(result.score);
                    scores.push(score);
                    sub_scores.insert(judge.name.clone(), json!(score));
                    judge_outputs.insert(
                        judge.name.clone(),
                        json!({
                            "score": score,
                            "explanation": result.explanation.unwrap_or_default(),
                            "raw": {"details": result.details, "raw": result.raw},
                        }),
                    );
                }
                Ok(result) => {
                    let message = result.error.unwrap_or_default();
                    debug!(judge = %judge.name, error = %message, "Calibration judge produced no verdict");
                    errors.insert(judge.name.clone(), json!(message));
                }
                Err(e) => {
                    debug!(judge = %judge.name, error = %e, "Calibration judge failed");
                    errors.insert(judge.name.clone(), json!(e.to_string()));
                }
            }
        }

        let (lo, hi) = scores
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, &s| match acc {
                Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
                None => Some((s, s)),
            })
            .unwrap_or((0.0, 0.0));

        if scores.is_empty() {
            return Ok(MetricResult::new(self.name.clone(), 0.0)
                .with_explanation(format!("Calibration failed for {target}; no valid scores"))
                .with_detail("metric_name", target)
                .with_detail("sub_scores", Value::Object(sub_scores))
                .with_detail("judge_outputs", Value::Object(judge_outputs))
                .with_detail("min", 0.0)
                .with_detail("max", 0.0)
                .with_detail("spread", 1.0)
                .with_detail("confidence", 0.0)
                .with_detail("errors", Value::Object(errors)));
        }

        let spread = hi - lo;
        let agreement = (1.0 - spread).max(0.0);
        let explanation = format!(
            "Calibration for {target}: {} judges, range [{lo:.2}, {hi:.2}], spread={spread:.2}, agreement={agreement:.2}.",
            scores.len()
        );

        Ok(MetricResult::new(self.name.clone(), agreement)
            .with_explanation(explanation)
            .with_detail("metric_name", target)
            .with_detail("sub_scores", Value::Object(sub_scores))
            .with_detail("judge_outputs", Value::Object(judge_outputs))
            .with_detail("min", lo)
            .with_detail("max", hi)
            .with_detail("spread", spread)
            .with_detail("confidence", agreement)
            .with_detail("errors", Value::Object(errors)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::judge::MockLlmProvider;
    use crate::metrics::test_support::context_with;
    use crate::metrics::{AnswerRelevance, Clarity};

    #[test]
    fn test_standard_panel_names() {
        let cal = Calibration::for_target(Arc::new(Clarity));
        assert_eq!(cal.name(), "calibration_clarity");
        let names: Vec<&str> = cal.judges().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cl_gpt4omini_t00_run1",
                "cl_gpt4omini_t00_run2",
                "cl_gpt4omini_t20",
                "cl_gpt4omini_t50",
                "cl_gpt41mini_t00",
                "cl_gpt41mini_t30",
            ]
        );
        assert_eq!(cal.judges()[5].model, "gpt-4.1-mini");
        assert_eq!(cal.judges()[5].temperature, 0.3);
    }

    #[tokio::test]
    async fn test_agreement_from_spread() {
        // score depends on the model each panel member asks for
        let mock = Arc::new(MockLlmProvider::with_responder(|req| {
            let score = match req.model.as_deref() {
                Some("gpt-4.1-mini") => 0.6,
                _ => 0.9,
            };
            Ok(format!(r#"{{"score": {score}, "justification": "ok"}}"#))
        }));
        let ctx = context_with(mock.clone());
        let cal = Calibration::for_target(Arc::new(AnswerRelevance));
        let item = EvalItem::new("q").with_answer("a");

        let result = cal.evaluate(&ctx, &item).await.unwrap();
        assert!((result.score - 0.7).abs() < 1e-9);
        assert_eq!(result.details["metric_name"], "answer_relevance");
        assert_eq!(result.details["sub_scores"]["ar_gpt41mini_t00"], json!(0.6));
        assert_eq!(
            result.details["judge_outputs"]["ar_gpt4omini_t20"]["explanation"],
            "ok"
        );
        assert_eq!(
            result.explanation.as_deref(),
            Some(
                "Calibration for answer_relevance: 6 judges, range [0.60, 0.90], spread=0.30, agreement=0.70."
            )
        );

        let temps: Vec<f32> = mock.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.0, 0.0, 0.2, 0.5, 0.0, 0.3]);
    }

    #[tokio::test]
    async fn test_all_judges_failing() {
        let mock = Arc::new(MockLlmProvider::with_responder(|_| {
            Err(LlmError::AuthFailed {
                provider: "openai".into(),
            })
        }));
        let ctx = context_with(mock);
        let cal = Calibration::for_target(Arc::new(Clarity)).with_judges(vec![
            JudgeVariant::new("a", "m1", 0.0),
            JudgeVariant::new("b", "m2", 0.1),
        ]);

        let result = cal
            .evaluate(&ctx, &EvalItem::new("q").with_answer("a"))
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.explanation.as_deref(),
            Some("Calibration failed for clarity; no valid scores")
        );
        assert_eq!(result.details["spread"], json!(1.0));
        assert_eq!(result.details["errors"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_member_is_excluded() {
        let mock = Arc::new(MockLlmProvider::with_responder(|req| {
            if req.model.as_deref() == Some("broken") {
                Err(LlmError::Connection {
                    message: "refused".into(),
                })
            } else {
                Ok(r#"{"score": 0.8}"#.to_string())
            }
        }));
        let ctx = context_with(mock);
        let cal = Calibration::for_target(Arc::new(Clarity)).with_judges(vec![
            JudgeVariant::new("good", "gpt-4o-mini", 0.0),
            JudgeVariant::new("bad", "broken", 0.0),
        ]);

        let result = cal
            .evaluate(&ctx, &EvalItem::new("q").with_answer("a"))
            .await
            .unwrap();
        assert_eq!(result.score, 1.0);
        assert!(result.details["errors"]["bad"].as_str().unwrap().contains("refused"));
        assert!(result.details["sub_scores"].get("bad").is_none());
    }

    #[test]
    fn test_panel_prefix_falls_back_to_name() {
        assert_eq!(panel_prefix(STRICT_FAITHFULNESS), "sf");
        assert_eq!(panel_prefix("custom"), "custom");
    }
}
