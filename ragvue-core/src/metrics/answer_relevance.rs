//! Answer relevance: topical alignment of the answer with the question.

use super::{ANSWER_RELEVANCE, Metric, MetricContext};
use crate::error::MetricError;
use crate::parse::{coerce_score, parse_json_object, str_field};
use crate::types::{EvalItem, MetricResult};
use async_trait::async_trait;
use serde_json::{Value, json};

const SYSTEM_PROMPT: &str =
    "You are a strict evaluation judge. Output ONLY compact JSON per the schema.";

fn user_prompt(question: &str, answer: &str) -> String {
    format!(
        "Metric: answer relevance.\n\
Task: Judge how well the ANSWER addresses the QUESTION.\n\
Focus only on topicality and alignment with the question's intent; \
do not evaluate factual correctness or writing quality.\n\
Scoring guidelines:\n  \
- 0.9–1.0: Directly on-topic and strongly aligned with what the question is asking.\n  \
- 0.7–0.8: Mostly on-topic with minor omissions or small digressions.\n  \
- 0.4–0.6: Partially relevant or too generic.\n  \
- <0.4: Largely off-topic, unhelpful, or answering a different question.\n\
If the question has multiple parts, you may note which parts of the question are not addressed, \
but the score should reflect overall topical relevance, not strict completeness.\n\n\
QUESTION:\n{question}\n\nANSWER:\n{answer}\n\n\
Return compact JSON only, exactly:\n\
{{\"score\": <float 0.0-1.0>, \"missing_parts\": [\"...\"], \"off_topic\": [\"...\"], \"justification\": \"...\"}}"
    )
}

pub struct AnswerRelevance;

#[async_trait]
impl Metric for AnswerRelevance {
    fn name(&self) -> &str {
        ANSWER_RELEVANCE
    }

    fn description(&self) -> &str {
        "How directly the answer addresses the question's intent"
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
                &user_prompt(&item.question, item.answer_text()),
                &ctx.model_for(ANSWER_RELEVANCE),
                ctx.temperature_for(ANSWER_RELEVANCE),
            )
            .await?;

        let verdict = parse_json_object(&reply);
        let score = verdict.get("score").map(coerce_score).unwrap_or(0.0);
        let list = |key: &str| verdict.get(key).cloned().unwrap_or_else(|| json!([]));

        Ok(MetricResult::new(ANSWER_RELEVANCE, score)
            .with_explanation(str_field(&verdict, "justification"))
            .with_detail("missing_parts", list("missing_parts"))
            .with_detail("off_topic", list("off_topic"))
            .with_raw(Value::Object(verdict.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::MockLlmProvider;
    use crate::metrics::test_support::context_with;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_score_and_justification() {
        let mock = Arc::new(MockLlmProvider::with_response(
            r#"{"score": "0.8", "missing_parts": ["year"], "off_topic": [], "justification": "Mostly on topic."}"#,
        ));
        let ctx = context_with(mock.clone());
        let item = EvalItem::new("Who wrote 1984 and when?").with_answer("George Orwell.");

        let result = AnswerRelevance.evaluate(&ctx, &item).await.unwrap();
        assert_eq!(result.score, 0.8);
        assert_eq!(result.explanation.as_deref(), Some("Mostly on topic."));
        assert_eq!(result.details["missing_parts"], json!(["year"]));
        assert_eq!(result.raw.unwrap()["justification"], "Mostly on topic.");

        let prompt = &mock.requests()[0].messages[1].content;
        assert!(prompt.contains("QUESTION:\nWho wrote 1984 and when?\n\nANSWER:\nGeorge Orwell."));
    }

    #[tokio::test]
    async fn test_missing_score_is_zero() {
        let ctx = context_with(Arc::new(MockLlmProvider::with_response("not json")));
        let result = AnswerRelevance
            .evaluate(&ctx, &EvalItem::new("q").with_answer("a"))
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.details["off_topic"], json!([]));
        assert_eq!(result.raw, Some(json!({})));
    }

    #[tokio::test]
    async fn test_uses_metric_override() {
        let mock = Arc::new(MockLlmProvider::new());
        let ctx = context_with(mock.clone()).with_judge_settings(ANSWER_RELEVANCE, "gpt-4.1-mini", 0.3);
        AnswerRelevance
            .evaluate(&ctx, &EvalItem::new("q").with_answer("a"))
            .await
            .unwrap();
        let request = &mock.requests()[0];
        assert_eq!(request.model.as_deref(), Some("gpt-4.1-mini"));
        assert_eq!(request.temperature, 0.3);
    }
}
