//! Answer completeness: how many of the question's aspects the answer covers.
//!
//! Aspects come from the item when provided, otherwise from the judge, and as a
//! last resort from a deterministic token checklist. Contexts are ignored.

use super::{ANSWER_COMPLETENESS, Metric, MetricContext};
use crate::aspects::{fallback_aspects, get_aspects};
use crate::error::MetricError;
use crate::parse::{clip01, parse_json_object, str_field, truthy};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

const MAX_PROVIDED_ASPECTS: usize = 12;
const MAX_DERIVED_ASPECTS: usize = 6;
const EVIDENCE_MAX_WORDS: usize = 20;

const SYSTEM_PROMPT: &str = "You are a strict COMPLETENESS judge. \
Given a list of aspects derived from only the QUESTION, \
decide for each aspect whether the ANSWER explicitly covers it. \
Use the ANSWER text only; do NOT use your internal or external knowledge or retrieved documents. \
Output JSON only.";

fn user_prompt(aspects: &[String], answer: &str) -> String {
    let aspects = Value::from(aspects.to_vec());
    format!(
        "Aspects (JSON array): {aspects}\n\n\
ANSWER:\n{answer}\n\n\
Return JSON with this exact schema:\n\
{{\n  \"score\": <float 0..1>,   // covered_count / aspects_count\n  \"per_aspect\": [\n    \
{{\"aspect\": \"<text>\", \"covered\": true|false, \"evidence\": \"<<= {EVIDENCE_MAX_WORDS} words quoted from ANSWER or null>\"}}\n  ],\n  \
\"explanation\": \"<one line>\"\n}}\n\
Rules:\n\
- Mark covered=true only if the ANSWER explicitly provides the information for that aspect.\n\
- If the ANSWER is vague/silent, mark covered=false.\n\
- Evidence must be a short quote (<= {EVIDENCE_MAX_WORDS} words) from the ANSWER itself, or null if not covered.\n\
- JSON only."
    )
}

pub struct AnswerCompleteness;

impl AnswerCompleteness {
    async fn build_aspects(ctx: &MetricContext, item: &EvalItem) -> Vec<String> {
        if let Some(provided) = item.aspects.as_ref().filter(|a| !a.is_empty()) {
            return provided
                .iter()
                .take(MAX_PROVIDED_ASPECTS)
                .cloned()
                .collect();
        }
        let model = ctx.model_for(ANSWER_COMPLETENESS);
        match get_aspects(ctx.judge(), &item.question, None, &model, MAX_DERIVED_ASPECTS).await {
            Ok(aspects) => aspects,
            Err(e) => {
                warn!(error = %e, "Aspect extraction failed; using question tokens");
                fallback_aspects(&item.question, MAX_DERIVED_ASPECTS)
            }
        }
    }
}

#[async_trait]
impl Metric for AnswerCompleteness {
    fn name(&self) -> &str {
        ANSWER_COMPLETENESS
    }

    fn description(&self) -> &str {
        "Fraction of question aspects explicitly covered by the answer"
    }

    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError> {
        let aspects = Self::build_aspects(ctx, item).await;
        if aspects.is_empty() {
            return Ok(MetricResult::new(ANSWER_COMPLETENESS, 0.0)
                .with_explanation("No aspects could be derived from the question."));
        }

        let answer = item.answer_text();
        let reply = ctx
            .judge()
            .chat_json(
                SYSTEM_PROMPT,
                &user_prompt(&aspects, answer),
                &ctx.model_for(ANSWER_COMPLETENESS),
                ctx.temperature_for(ANSWER_COMPLETENESS),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        let records = verdict.get("per_aspect").and_then(Value::as_array);
        let per_aspect: Vec<Value> = aspects
            .iter()
            .enumerate()
            .map(|(i, aspect)| {
                let rec = records.and_then(|l| l.get(i)).and_then(Value::as_object);
                // "correct" is the older name for the flag
                let flag = rec.and_then(|r| r.get("covered").or_else(|| r.get("correct")));
                json!({
                    "aspect": rec.and_then(|r| r.get("aspect")).cloned().unwrap_or_else(|| json!(aspect)),
                    "covered": truthy(flag),
                    "evidence": rec.and_then(|r| r.get("evidence")).cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        let covered = per_aspect
            .iter()
            .filter(|r| r["covered"].as_bool().unwrap_or(false))
            .count();
        let total = aspects.len();
        let explanation = Some(str_field(&verdict, "explanation"))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("{covered}/{total} aspects covered."));

        Ok(
            MetricResult::new(ANSWER_COMPLETENESS, clip01(covered as f64 / total.max(1) as f64))
                .with_explanation(explanation)
                .with_detail("per_aspect", Value::Array(per_aspect))
                .with_detail("aspects", aspects)
                .with_detail("answer_len", answer.chars().count())
                .with_raw(json!({"llm_output": verdict})),
        )
    }
}
