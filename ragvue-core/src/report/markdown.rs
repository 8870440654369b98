use super::fmt2;
use crate::parse::truncate_chars;
use crate::types::EvalReport;
use std::fmt::Write;

const RAW_SNIPPET_CHARS: usize = 300;

pub fn render(report: &EvalReport) -> String {
    let mut lines: Vec<String> = vec!["# RAG Evaluation Report\n".to_string()];

    if !report.summary.is_empty() {
        lines.push("## Summary (mean scores of all cases)".into());
        lines.push(String::new());
        lines.push("| Metric | Mean score |".into());
        lines.push("| :------ | ---------: |".into());
        for (name, score) in &report.summary {
            lines.push(format!("| **{name}** | {} |", fmt2(*score)));
        }
        lines.push(String::new());
    }

    lines.push("## Individual Case Report\n".into());
    for (idx, result) in report.results.iter().enumerate() {
        let item = &result.item;
        lines.push(format!("### Case {}", idx + 1));
        lines.push(format!("- Question: {}", item.question));
        if let Some(answer) = &item.answer {
            lines.push(format!("- Answer: {answer}"));
        }
        if !item.contexts.is_empty() {
            lines.push(format!("- Contexts: {}", item.contexts.len()));
            for (i, ctx) in item.contexts.iter().enumerate() {
                lines.push(format!("  - [{}] {}", i + 1, ctx));
            }
        }
        if let Some(secs) = result.eval_time_sec {
            lines.push(format!("- Eval time: {} s", fmt2(secs)));
        }
        lines.push(String::new());

        if result.metrics.is_empty() {
            continue;
        }

        lines.push("**Metric scores**".into());
        lines.push(String::new());
        lines.push("| Metric | Score |".into());
        lines.push("| :------ | ----: |".into());
        for m in &result.metrics {
            lines.push(format!("| {} | {} |", m.name, fmt2(m.score)));
        }
        lines.push(String::new());

        lines.push("**Metric details**".into());
        for m in &result.metrics {
            let mut entry = format!("- **{}** ({})", m.name, fmt2(m.score));
            if let Some(explanation) = m.explanation.as_deref().filter(|e| !e.is_empty()) {
                let _ = write!(entry, "\n  - explanation: {explanation}");
            }
            if let Some(error) = &m.error {
                let _ = write!(entry, "\n  - error: {error}");
            }
            lines.push(entry);
            if !m.details.is_empty() {
                let pretty = serde_json::to_string_pretty(&m.details).unwrap_or_default();
                lines.push("  - details:\n".into());
                lines.push("```json".into());
                lines.push(pretty);
                lines.push("```".into());
            }
            if let Some(raw) = m.raw.as_ref().filter(|r| r.is_object()) {
                let compact = raw.to_string();
                lines.push(format!(
                    "  - raw: `{}...`",
                    truncate_chars(&compact, RAW_SNIPPET_CHARS)
                ));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
