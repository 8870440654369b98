//! Retrieval coverage: how many of the question's aspects the retrieved
//! documents support.

use super::{Metric, MetricContext, RETRIEVAL_COVERAGE, format_documents};
use crate::aspects::get_aspects;
use crate::error::MetricError;
use crate::parse::{clip01, parse_json_object, str_field, truthy};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Value, json};

const MAX_ASPECTS: usize = 5;
const EVIDENCE_MAX_WORDS: usize = 10;

fn system_prompt() -> String {
    format!(
        "You are an evidence checker for retrieval coverage.\n\
For each aspect of the QUESTION, decide if it is supported by ANY of the given documents.\n\
- Keep \"evidence\" at most {EVIDENCE_MAX_WORDS} words and quote from the documents if covered; \
otherwise use an empty string \"\".\n\
Be strict: set covered=true only if the evidence clearly supports the aspect.\n\
Do NOT fabricate evidence; it must be a direct quote or very close extract from the given documents.\n\
Return ONLY JSON with this exact structure:\n\
{{\n  \"aspects\": [\n    {{ \"aspect\": \"<string>\", \"covered\": true|false, \"evidence\": \"<=WORDS words or empty string\" }},\n    ...\n  ]\n}}\n"
    )
}

pub struct RetrievalCoverage;

#[async_trait]
impl Metric for RetrievalCoverage {
    fn name(&self) -> &str {
        RETRIEVAL_COVERAGE
    }

    fn description(&self) -> &str {
        "Fraction of question aspects supported by the retrieved documents"
    }

    async fn evaluate(
        &self,
        ctx: &MetricContext,
        item: &EvalItem,
    ) -> Result<MetricResult, MetricError> {
        let aspects = get_aspects(
            ctx.judge(),
            &item.question,
            item.aspects.as_deref(),
            &ctx.aspects_model(),
            MAX_ASPECTS,
        )
        .await?;

        if aspects.is_empty() {
            return Ok(MetricResult::new(RETRIEVAL_COVERAGE, 0.0)
                .with_explanation("No aspects extracted for the question.")
                .with_detail("per_aspect", json!([]))
                .with_raw(json!({
                    "question": item.question,
                    "contexts_count": item.contexts.len(),
                    "aspects": [],
                })));
        }

        let documents = if item.contexts.is_empty() {
            "(no documents provided)".to_string()
        } else {
            format_documents(&item.contexts)
        };
        let user = format!(
            "QUESTION:\n{}\n\nASPECTS (ordered):\n{}\n\nDOCUMENTS:\n{}\n\nJSON only.",
            item.question,
            Value::from(aspects.clone()),
            documents
        );

        let model = ctx.model_for(RETRIEVAL_COVERAGE);
        let reply = ctx
            .judge()
            .chat_json(
                &system_prompt(),
                &user,
                &model,
                ctx.temperature_for(RETRIEVAL_COVERAGE),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        let records = verdict
            .get("aspects")
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty());

        let per_aspect: Vec<Value> = aspects
            .iter()
            .enumerate()
            .map(|(i, aspect)| {
                let rec = records.and_then(|l| l.get(i)).and_then(Value::as_object);
                json!({
                    "aspect": aspect,
                    "covered": truthy(rec.and_then(|r| r.get("covered"))),
                    "evidence": rec.map(|r| str_field(r, "evidence")).unwrap_or_default(),
                })
            })
            .collect();

        let covered = per_aspect
            .iter()
            .filter(|r| r["covered"].as_bool().unwrap_or(false))
            .count();
        let total = per_aspect.len();

        Ok(
            MetricResult::new(RETRIEVAL_COVERAGE, clip01(covered as f64 / total.max(1) as f64))
                .with_explanation(format!("Covered {covered} of {total} aspects."))
                .with_detail("per_aspect", Value::Array(per_aspect))
                .with_raw(json!({
                    "question": item.question,
                    "aspects": aspects,
                    "contexts_count": item.contexts.len(),
                    "model": model,
                })),
        )
    }
}
