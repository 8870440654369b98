//! Clarity: how well the answer is written, independent of correctness.

use super::{CLARITY, Metric, MetricContext};
use crate::error::MetricError;
use crate::parse::{coerce_score, parse_json_object, str_field};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Value, json};

const SYSTEM_PROMPT: &str = "You are a deterministic evaluation judge for linguistic clarity. \
Return ONLY valid JSON per the schema.";

fn user_prompt(answer: &str) -> String {
    format!(
        "Metric: clarity, fluency, and coherence of the ANSWER for a general audience.\n\
Evaluate linguistic quality, including grammar, sentence flow, logical organization, conciseness, and ease of reading.\n\
This metric assesses *how well the answer is written*, not whether it is factually correct.\n\n\
Scoring guidelines:\n  \
• 0.9–1.0: Very clear, well-structured, fluent, and easy to read.\n  \
• 0.7–0.8: Mostly clear with minor issues.\n  \
• 0.4–0.6: Noticeable clarity or flow problems.\n  \
• <0.4: Unclear, disorganized, or difficult to read.\n\n\
Short answers:\n  \
• If the answer is short (1–10 words), evaluate BOTH grammaticality and whether the phrasing is readable, natural, and understandable to a general audience.\n  \
• Do NOT blindly give high scores to short one-word or fragment answers if they are abrupt, unnatural, or unclear.\n\n\
ANSWER:\n{answer}\n\n\
Return compact JSON only, exactly in this format:\n\
{{\n  \"score\": <float between 0.0 and 1.0>,\n  \"explanation\": \"<1–2 sentence summary of the clarity assessment>\",\n  \
\"issues\": [\"...\"],\n  \"suggestions\": \"<1–2 short suggestions for improving clarity>\"\n}}\n\
Only JSON. No commentary, markup, or extra text."
    )
}

pub struct Clarity;

#[async_trait]
impl Metric for Clarity {
    fn name(&self) -> &str {
        CLARITY
    }

    fn description(&self) -> &str {
        "Grammar, flow and readability of the answer"
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
                &user_prompt(item.answer_text()),
                &ctx.model_for(CLARITY),
                ctx.temperature_for(CLARITY),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        let score = verdict.get("score").map(coerce_score).unwrap_or(0.0);

        Ok(MetricResult::new(CLARITY, score)
            .with_explanation(str_field(&verdict, "explanation"))
            .with_detail(
                "issues",
                verdict.get("issues").cloned().unwrap_or_else(|| json!([])),
            )
            .with_detail(
                "suggestions",
                verdict.get("suggestions").cloned().unwrap_or_else(|| json!("")),
            )
            .with_raw(Value::Object(verdict)))
    }
}
