//! Strict faithfulness: the share of the answer's atomic claims that the
//! contexts directly support.
//!
//! One judge pass extracts claims and labels them. Claims the judge calls
//! hallucinated but which appear literally in the contexts are moved back to
//! supported.

use super::{Metric, MetricContext, STRICT_FAITHFULNESS};
use crate::error::MetricError;
use crate::parse::{clip01, normalize_ws, parse_json_object, str_field, truncate_chars};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

const SYSTEM_PROMPT: &str = "You are a strict factual evaluation agent. \
Determine exactly which parts of the ANSWER are grounded in the CONTEXTS. \
Do not assume correctness unless it matches the context explicitly. \
Return valid JSON only.";

const RAW_TEXT_LIMIT: usize = 500;
const PARTIAL: &str = "partial_hallucination";
const FULL: &str = "full_hallucination";
const LITERAL_MATCH: &str = "literal-match";

fn user_prompt(answer: &str, contexts: &[String]) -> String {
    let context = contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a professional fact-checking judge.\n\
Your goal: determine whether each factual claim in the ANSWER is directly supported by the CONTEXTS.\n\n\
You MUST do everything in ONE step:\n\
1. Extract factual claims ONLY from the literal content of the ANSWER:\n   \
- Use the ANSWER exactly as written.\n   \
- Do NOT add, infer, expand, or reconstruct new claims.\n   \
- Every claim you evaluate must be explicitly present in the ANSWER text.\n\n\
2. Split the ANSWER into short, atomic factual claims.\n   \
- Do NOT split names or compound phrases unnaturally. Split only at sentence-level or clear independent factual units.\n   \
- Do NOT merge independent facts.\n   \
- Do NOT generate comparative, causal, or inferred statements that are not literally in the ANSWER.\n\n\
3. For each claim, check if it is supported by any of the provided CONTEXTS using STRICT rules:\n   \
- Carefully read the entire set of CONTEXTS.\n   \
- Entities (people, places, organizations) must appear with the same meaning/spelling (case/spacing differences are ok).\n   \
- Temporal info (years, dates) must match exactly.\n   \
- If a sentence or phrase from the ANSWER appears verbatim or almost verbatim in the CONTEXTS, you MUST mark that claim as supported.\n   \
- Support must come ONLY from the CONTEXTS.\n   \
- Do NOT say the context lacks information if the same statement is clearly present in the CONTEXTS.\n   \
- If the context does not explicitly support a claim, or contradicts it, mark it as hallucinated.\n\n\
4. Classify each claim into:\n   \
- \"supported\": fully supported by the context.\n   \
- \"partial_hallucination\": some parts supported but at least one factual element unsupported.\n   \
- \"full_hallucination\": not supported at all or contradicts the context.\n\n\
5. Compute strict_faithfulness = (# supported claims) / (total number of claims).\n\n\
6. Return JSON ONLY in this exact format:\n\
{{\n  \"strict_faithfulness\": <float>,\n  \"supported_claims\": [\n     \
{{\"claim\": \"...\", \"supported_by\": \"<context snippet>\"}}\n  ],\n  \"hallucinated_claims\": [\n     \
{{\"claim\": \"...\", \"type\": \"partial_hallucination\" | \"full_hallucination\", \"reason\": \"...\", \"evidence\": \"<context snippet or empty>\"}}\n  ],\n  \
\"explanation\": \"short 1–3 sentence summary\"\n}}\n\n\
ANSWER:\n{answer}\n\n\
CONTEXTS (retrieved evidences):\n{context}\n\n\
Respond strictly in JSON only."
    )
}

pub struct StrictFaithfulness;

#[async_trait]
impl Metric for StrictFaithfulness {
    fn name(&self) -> &str {
        STRICT_FAITHFULNESS
    }

    fn description(&self) -> &str {
        "Fraction of answer claims directly supported by the contexts"
    }

    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError> {
        let reply = ctx
            .judge()
            .chat_json(
                SYSTEM_PROMPT,
                &user_prompt(item.answer_text(), &item.contexts),
                &ctx.model_for(STRICT_FAITHFULNESS),
                ctx.temperature_for(STRICT_FAITHFULNESS),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        if !verdict.contains_key("strict_faithfulness") && !verdict.contains_key("supported_claims")
        {
            return Ok(
                MetricResult::failed(STRICT_FAITHFULNESS, "Could not parse JSON from model output.")
                    .with_detail("raw_text", truncate_chars(&reply, RAW_TEXT_LIMIT)),
            );
        }

        let mut supported = supported_claims(&verdict);
        let context_blob = item
            .contexts
            .iter()
            .map(|c| normalize_ws(&c.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" ");

        let mut hallucinated = Vec::new();
        for claim in hallucinated_claims(&verdict) {
            let text = claim["claim"].as_str().unwrap_or_default();
            let normalized = normalize_ws(&text.to_lowercase());
            if !normalized.is_empty() && context_blob.contains(&normalized) {
                supported.push(json!({"claim": text, "supported_by": LITERAL_MATCH}));
            } else {
                hallucinated.push(claim);
            }
        }

        let total = (supported.len() + hallucinated.len()).max(1);
        let count_type = |kind: &str| hallucinated.iter().filter(|h| h["type"] == kind).count();
        let (partial, full) = (count_type(PARTIAL), count_type(FULL));
        let explanation = format!(
            "{} of {total} claims supported; {partial} partial and {full} full hallucinations.",
            supported.len()
        );
        let score = clip01(supported.len() as f64 / total as f64);

        Ok(MetricResult::new(STRICT_FAITHFULNESS, score)
            .with_explanation(explanation)
            .with_detail("supported_claims", Value::Array(supported))
            .with_detail("hallucinated_claims", Value::Array(hallucinated))
            .with_raw(json!({
                "summary": {
                    "strict_faithfulness": verdict.get("strict_faithfulness").cloned().unwrap_or(Value::Null),
                    "explanation": str_field(&verdict, "explanation"),
                }
            })))
    }
}

fn claim_list<'a>(verdict: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    verdict
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn text_of(entry: &Map<String, Value>, key: &str) -> Value {
    entry.get(key).cloned().unwrap_or_else(|| json!(""))
}

fn supported_claims(verdict: &Map<String, Value>) -> Vec<Value> {
    claim_list(verdict, "supported_claims")
        .filter_map(|entry| match entry {
            Value::Object(e) => Some(json!({
                "claim": text_of(e, "claim"),
                "supported_by": text_of(e, "supported_by"),
            })),
            Value::String(s) => Some(json!({"claim": s, "supported_by": ""})),
            _ => None,
        })
        .collect()
}

fn hallucinated_claims(verdict: &Map<String, Value>) -> Vec<Value> {
    claim_list(verdict, "hallucinated_claims")
        .filter_map(|entry| match entry {
            Value::Object(e) => Some(json!({
                "claim": text_of(e, "claim"),
                "type": e.get("type").cloned().unwrap_or_else(|| json!(FULL)),
                "reason": text_of(e, "reason"),
                "evidence": text_of(e, "evidence"),
            })),
            Value::String(s) => Some(json!({
                "claim": s,
                "type": FULL,
                "reason": "",
                "evidence": "",
            })),
            _ => None,
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
        EvalItem::new("Who wrote 1984 and when?")
            .with_answer("George Orwell wrote 1984. It was published in 1949. He lived in Paris.")
            .with_contexts([
                "1984 is a   dystopian novel by George Orwell.",
                "It was published in 1949 by Secker & Warburg.",
            ])
    }

    #[tokio::test]
    async fn test_scores_supported_over_total() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response(
            r#"{
                "strict_faithfulness": 0.5,
                "supported_claims": [{"claim": "George Orwell wrote 1984", "supported_by": "[1]"}],
                "hallucinated_claims": [
                    {"claim": "He lived in Paris", "type": "full_hallucination", "reason": "absent"},
                    "Orwell won a Nobel prize"
                ],
                "explanation": "one supported"
            }"#,
        )));

        let result = StrictFaithfulness.evaluate(&ctx, &item()).await.unwrap();
        assert!((result.score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            result.explanation.as_deref(),
            Some("1 of 3 claims supported; 0 partial and 2 full hallucinations.")
        );
        assert_eq!(result.details["hallucinated_claims"][1]["type"], FULL);
        assert_eq!(result.raw.unwrap()["summary"]["explanation"], "one supported");
    }

    #[tokio::test]
    async fn test_literal_match_overrides_hallucination_label() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response(
            r#"{
                "supported_claims": [],
                "hallucinated_claims": [
                    {"claim": "It was  PUBLISHED in 1949", "type": "partial_hallucination"},
                    {"claim": "He lived in Paris", "type": "partial_hallucination"}
                ]
            }"#,
        )));

        let result = StrictFaithfulness.evaluate(&ctx, &item()).await.unwrap();
        assert_eq!(result.score, 0.5);
        assert_eq!(
            result.details["supported_claims"][0]["supported_by"],
            LITERAL_MATCH
        );
        assert_eq!(
            result.explanation.as_deref(),
            Some("1 of 2 claims supported; 1 partial and 0 full hallucinations.")
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_records_error() {
        let reply = "x".repeat(800);
        let ctx = context_with(Arc::new(MockLlmProvider::with_response(&reply)));

        let result = StrictFaithfulness.evaluate(&ctx, &item()).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.error.as_deref(),
            Some("Could not parse JSON from model output.")
        );
        assert_eq!(result.details["raw_text"].as_str().unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_no_claims_scores_zero() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response(
            r#"{"strict_faithfulness": 0}"#,
        )));
        let result = StrictFaithfulness.evaluate(&ctx, &item()).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_prompt_numbers_contexts() {
        let mock = Arc::new(MockLlmProvider::with_response(r#"{"supported_claims": []}"#));
        let ctx = context_with(mock.clone());
        StrictFaithfulness.evaluate(&ctx, &item()).await.unwrap();

        let prompt = &mock.requests()[0].messages[1].content;
        assert!(prompt.contains("[2] It was published in 1949"));
        assert!(prompt.contains("ANSWER:\nGeorge Orwell wrote 1984."));
    }
}
