//! Core types: judge messages, evaluation items, metric results, and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Role of a participant in a judge conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message sent to the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Request sent to an [`LlmProvider`](crate::judge::LlmProvider).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    /// Overrides the provider's configured model when set.
    pub model: Option<String>,
    /// Ask for a bare JSON object (`response_format: json_object`).
    pub json_mode: bool,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.0,
            max_tokens: None,
            model: None,
            json_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Judge reply.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// One question/answer/contexts triple to evaluate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalItem {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default, alias = "context")]
    pub contexts: Vec<String>,
    /// Caller-provided checklist used instead of extracting aspects from the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspects: Option<Vec<String>>,
    /// Any other fields of the input record (`id`, `ground_truth`, ...), written back
    /// at the top level so report rows can be joined to their source records.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl EvalItem {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aspects<I, S>(mut self, aspects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aspects = Some(aspects.into_iter().map(Into::into).collect());
        self
    }

    /// Answer text, or `""` when absent.
    pub fn answer_text(&self) -> &str {
        self.answer.as_deref().unwrap_or("")
    }

    /// True when the answer is present and not blank.
    pub fn has_answer(&self) -> bool {
        self.answer.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    /// Contexts with surrounding whitespace removed; blank entries dropped.
    pub fn non_empty_contexts(&self) -> Vec<&str> {
        self.contexts
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Verdict of one metric on one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricResult {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            ..Default::default()
        }
    }

    /// Score-0 result recording why no verdict was produced.
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0.0,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// All metric verdicts for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvaluation {
    pub item: EvalItem,
    pub metrics: Vec<MetricResult>,
    pub aggregate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_time_sec: Option<f64>,
}

impl ItemEvaluation {
    /// Aggregate when present, else the mean of the metric scores.
    pub fn item_score(&self) -> Option<f64> {
        self.aggregate
            .or_else(|| mean(self.metrics.iter().map(|m| m.score)))
    }

    pub fn metric(&self, name: &str) -> Option<&MetricResult> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    Manual,
    Agentic,
}

impl std::fmt::Display for EvalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalMode::Manual => write!(f, "manual"),
            EvalMode::Agentic => write!(f, "agentic"),
        }
    }
}

impl std::str::FromStr for EvalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(EvalMode::Manual),
            "agentic" => Ok(EvalMode::Agentic),
            other => Err(format!("unknown evaluation mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub mode: EvalMode,
    pub judge_model: String,
}

impl ReportMeta {
    pub fn new(mode: EvalMode, judge_model: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            mode,
            judge_model: judge_model.into(),
        }
    }
}

/// Collection of per-item results plus per-metric means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub results: Vec<ItemEvaluation>,
    #[serde(default)]
    pub summary: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ReportMeta>,
}

impl EvalReport {
    /// Build a report, computing the summary as the per-metric mean.
    pub fn from_results(results: Vec<ItemEvaluation>) -> Self {
        let summary = summarize(&results);
        Self {
            results,
            summary,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: ReportMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Keep only items whose item score is at least `min_score`.
    /// The summary is left untouched.
    pub fn filter_min_score(&self, min_score: f64) -> EvalReport {
        let results = self
            .results
            .iter()
            .filter(|r| r.item_score().unwrap_or(0.0) >= min_score)
            .cloned()
            .collect();
        EvalReport {
            results,
            summary: self.summary.clone(),
            meta: self.meta.clone(),
        }
    }

    pub fn stats(&self) -> ReportStats {
        ReportStats {
            items: self.results.len(),
            overall_mean: mean(self.results.iter().filter_map(|r| r.item_score())),
            mean_eval_time: mean(self.results.iter().filter_map(|r| r.eval_time_sec)),
        }
    }
}

/// Dashboard headline numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub items: usize,
    pub overall_mean: Option<f64>,
    pub mean_eval_time: Option<f64>,
}

/// Mean score per metric name over every item where the metric appears.
pub fn summarize(results: &[ItemEvaluation]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in results {
        for m in &r.metrics {
            let entry = sums.entry(m.name.clone()).or_insert((0.0, 0));
            entry.0 += m.score;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, n))| (name, if n == 0 { 0.0 } else { sum / n as f64 }))
        .collect()
}

pub(crate) fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn evaluation(scores: &[(&str, f64)], aggregate: Option<f64>) -> ItemEvaluation {
        ItemEvaluation {
            item: EvalItem::new("q"),
            metrics: scores
                .iter()
                .map(|(n, s)| MetricResult::new(*n, *s))
                .collect(),
            aggregate,
            eval_time_sec: Some(1.0),
        }
    }

    #[test]
    fn test_eval_item_accepts_context_alias() {
        let item: EvalItem = serde_json::from_value(json!({
            "question": "Who wrote 1984?",
            "answer": "George Orwell",
            "context": ["1984 is a novel by George Orwell."]
        }))
        .unwrap();
        assert_eq!(item.contexts.len(), 1);
        assert!(item.has_answer());
        assert!(item.aspects.is_none());
    }

    #[test]
    fn test_eval_item_keeps_unknown_fields_at_top_level() {
        let item: EvalItem = serde_json::from_value(json!({
            "id": "q-17",
            "ground_truth": "Orwell",
            "question": "Who wrote 1984?",
            "answer": "Orwell"
        }))
        .unwrap();
        assert_eq!(item.metadata.get("id"), Some(&json!("q-17")));
        assert!(!item.metadata.contains_key("question"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["id"], json!("q-17"));
        assert_eq!(value["ground_truth"], json!("Orwell"));
        assert_eq!(value["question"], json!("Who wrote 1984?"));
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_eval_item_missing_and_blank_answer() {
        let item: EvalItem = serde_json::from_value(json!({"question": "q"})).unwrap();
        assert!(!item.has_answer());
        assert_eq!(item.answer_text(), "");

        let blank = EvalItem::new("q").with_answer("   ");
        assert!(!blank.has_answer());
    }

    #[test]
    fn test_non_empty_contexts_trims() {
        let item = EvalItem::new("q").with_contexts(["  a ", "", "   ", "b"]);
        assert_eq!(item.non_empty_contexts(), vec!["a", "b"]);
    }

    #[test]
    fn test_metric_result_serialization_skips_empty_fields() {
        let result = MetricResult::new("clarity", 0.8).with_explanation("clear");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"name": "clarity", "score": 0.8, "explanation": "clear"})
        );
    }

    #[test]
    fn test_summary_is_mean_per_metric() {
        let results = vec![
            evaluation(&[("a", 1.0), ("b", 0.5)], None),
            evaluation(&[("a", 0.0)], None),
        ];
        let report = EvalReport::from_results(results);
        assert_eq!(report.summary["a"], 0.5);
        assert_eq!(report.summary["b"], 0.5);
        assert_eq!(report.summary.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_item_score_falls_back_to_metric_mean() {
        assert_eq!(evaluation(&[("a", 1.0)], Some(0.2)).item_score(), Some(0.2));
        assert_eq!(
            evaluation(&[("a", 1.0), ("b", 0.0)], None).item_score(),
            Some(0.5)
        );
        assert_eq!(evaluation(&[], None).item_score(), None);
    }

    #[test]
    fn test_filter_min_score_keeps_summary() {
        let report = EvalReport::from_results(vec![
            evaluation(&[("a", 0.9)], Some(0.9)),
            evaluation(&[("a", 0.1)], Some(0.1)),
        ]);
        let filtered = report.filter_min_score(0.5);
        assert_eq!(filtered.results.len(), 1);
        assert_eq!(filtered.summary, report.summary);
    }

    #[test]
    fn test_stats() {
        let report = EvalReport::from_results(vec![
            evaluation(&[("a", 1.0)], Some(1.0)),
            evaluation(&[("a", 0.0)], Some(0.0)),
        ]);
        let stats = report.stats();
        assert_eq!(stats.items, 2);
        assert_eq!(stats.overall_mean, Some(0.5));
        assert_eq!(stats.mean_eval_time, Some(1.0));
        assert_eq!(EvalReport::default().stats().overall_mean, None);
    }

    #[test]
    fn test_eval_mode_parse() {
        assert_eq!("Agentic".parse::<EvalMode>().unwrap(), EvalMode::Agentic);
        assert!("auto".parse::<EvalMode>().is_err());
        assert_eq!(EvalMode::Manual.to_string(), "manual");
    }
}
