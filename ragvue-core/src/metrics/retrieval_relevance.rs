//! Retrieval relevance: the share of retrieved chunks that are highly relevant
//! to the question.
//!
//! The judge scores each chunk in [0, 1]; a chunk counts as relevant when its
//! score reaches the configured threshold (0.7 by default).

use super::{Metric, MetricContext, RETRIEVAL_RELEVANCE, format_documents};
use crate::error::MetricError;
use crate::parse::{clip01, coerce_score, parse_json_object, str_field};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Value, json};

const SYSTEM_PROMPT: &str = "You are a retrieval relevance judge.\n\
For each document, assign a relevance score in [0,1] **to the QUESTION**.\n\
Guidelines:\n \
• 1.0 = directly answers or contains key facts to answer the question\n \
• 0.7–0.9 = highly useful but not the final answer by itself\n \
• 0.3–0.6 = weakly related or background\n \
• 0.0–0.2 = irrelevant\n\
Give a terse reason per document.\n\
Return ONLY JSON:\n\
{\n  \"per_chunk\": [\n    { \"chunk_id\": <int>, \"relevance\": <float 0..1>, \"reason\": \"<short>\" },\n    ...\n  ]\n}\n";

pub struct RetrievalRelevance;

#[async_trait]
impl Metric for RetrievalRelevance {
    fn name(&self) -> &str {
        RETRIEVAL_RELEVANCE
    }

    fn description(&self) -> &str {
        "Fraction of retrieved chunks judged highly relevant to the question"
    }

    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError> {
        let threshold = clip01(ctx.config().retrieval_relevance_threshold);
        let model = ctx.model_for(RETRIEVAL_RELEVANCE);

        if item.contexts.is_empty() {
            return Ok(MetricResult::new(RETRIEVAL_RELEVANCE, 0.0)
                .with_explanation("No retrieved contexts provided.")
                .with_detail("per_chunk", json!([]))
                .with_raw(json!({"question": item.question, "contexts_count": 0})));
        }

        let user = format!(
            "QUESTION:\n{}\n\nDOCUMENTS:\n{}\n\nReturn JSON only.",
            item.question,
            format_documents(&item.contexts)
        );
        let reply = ctx
            .judge()
            .chat_json(
                SYSTEM_PROMPT,
                &user,
                &model,
                ctx.temperature_for(RETRIEVAL_RELEVANCE),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        let per_chunk = align_chunks(verdict.get("per_chunk"), item.contexts.len());

        let relevant = per_chunk
            .iter()
            .filter(|c| c["relevance"].as_f64().unwrap_or(0.0) >= threshold)
            .count();
        let total = per_chunk.len();
        let score = relevant as f64 / total.max(1) as f64;

        Ok(MetricResult::new(RETRIEVAL_RELEVANCE, clip01(score))
            .with_explanation(format!(
                "{relevant} of {total} chunks ≥ {threshold:.2} relevance."
            ))
            .with_detail("per_chunk", Value::Array(per_chunk))
            .with_raw(json!({
                "question": item.question,
                "threshold": threshold,
                "contexts_count": item.contexts.len(),
                "model": model,
            })))
    }
}

/// One record per context, matched by position. A missing or empty list marks
/// every chunk irrelevant.
fn align_chunks(records: Option<&Value>, n: usize) -> Vec<Value> {
    let records = records
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty());
    (0..n)
        .map(|i| {
            let rec = records
                .and_then(|list| list.get(i))
                .and_then(Value::as_object);
            let relevance = rec
                .and_then(|r| r.get("relevance"))
                .map(coerce_score)
                .unwrap_or(0.0);
            let reason = rec.map(|r| str_field(r, "reason")).unwrap_or_default();
            json!({"chunk_id": i + 1, "relevance": relevance, "reason": reason})
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::MockLlmProvider;
    use crate::metrics::test_support::context_with;
    use std::sync::Arc;

    fn item() -> EvalItem {
        EvalItem::new("Who wrote 1984?")
            .with_answer("George Orwell")
            .with_contexts([
                "1984 is a novel by George Orwell.",
                "Orwell also wrote Animal Farm.",
                "Bananas are yellow.",
            ])
    }

    #[tokio::test]
    async fn test_counts_chunks_at_or_above_threshold() {
        let mock = Arc::new(MockLlmProvider::with_response(
            r#"{"per_chunk": [
                {"chunk_id": 1, "relevance": 1.0, "reason": "answers it"},
                {"chunk_id": 2, "relevance": 0.7, "reason": "related"},
                {"chunk_id": 3, "relevance": 0.0, "reason": "off topic"}
            ]}"#,
        ));
        let ctx = context_with(mock.clone());

        let result = RetrievalRelevance.evaluate(&ctx, &item()).await.unwrap();
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            result.explanation.as_deref(),
            Some("2 of 3 chunks ≥ 0.70 relevance.")
        );
        assert_eq!(result.details["per_chunk"][2]["reason"], "off topic");
        assert_eq!(result.raw.as_ref().unwrap()["contexts_count"], 3);

        let request = &mock.requests()[0];
        assert!(request.json_mode);
        assert!(request.messages[1].content.contains("[Doc 3] Bananas are yellow."));
    }

    #[tokio::test]
    async fn test_no_contexts_short_circuits() {
        let mock = Arc::new(MockLlmProvider::new());
        let ctx = context_with(mock.clone());

        let result = RetrievalRelevance
            .evaluate(&ctx, &EvalItem::new("q"))
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.explanation.as_deref(),
            Some("No retrieved contexts provided.")
        );
        assert_eq!(result.details["per_chunk"], json!([]));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_verdict_marks_all_irrelevant() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response("sorry, no idea")));
        let result = RetrievalRelevance.evaluate(&ctx, &item()).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.details["per_chunk"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_short_verdict_pads_missing_chunks() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response(
            r#"{"per_chunk": [{"relevance": "0.9"}]}"#,
        )));
        let result = RetrievalRelevance.evaluate(&ctx, &item()).await.unwrap();
        assert!((result.score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.details["per_chunk"][1]["relevance"], json!(0.0));
    }

    #[test]
    fn test_align_chunks_clamps_relevance() {
        let records = json!([{"relevance": 3.2, "reason": " r "}]);
        let aligned = align_chunks(Some(&records), 1);
        assert_eq!(aligned[0], json!({"chunk_id": 1, "relevance": 1.0, "reason": "r"}));
    }
}
