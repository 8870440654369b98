use super::fmt2;
use crate::parse::truncate_chars;
use crate::types::EvalReport;

const DETAILS_SNIPPET_CHARS: usize = 2000;
const RAW_SNIPPET_CHARS: usize = 1200;
const SUMMARY_LINE_CHARS: usize = 120;

pub const REPORT_CSS: &str = r#"
<style>
  body { font-family: Inter, system-ui, -apple-system, Segoe UI, Roboto, sans-serif; max-width: 1100px; margin: 2rem auto; padding: 0 1rem; }
  h1 { margin-top: 0; }
  .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 12px; }
  .card { border: 1px solid #e6e6e6; border-radius: 12px; padding: 12px 14px; background: #fff; }
  .metric { display:flex; justify-content:space-between; }
  .pill { background:#f5f5f7; border-radius:999px; padding:2px 10px; font-variant-numeric: tabular-nums; }
  .error { color:#b00020; }
  details { margin:8px 0 0 0; }
  summary { cursor:pointer; font-weight:600; outline:none; }
  summary::-webkit-details-marker { display:none; }
  summary::before { content: " "; display:inline-block; transition: transform 0.15s ease-out; }
  details[open] summary::before { transform: rotate(90deg); }
  .mono { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, "Liberation Mono", monospace; }
  .grid { display:grid; grid-template-columns: 1fr; gap: 12px; }
  .item { border:1px solid #efefef; border-radius:12px; padding:8px 10px; background:#fafafa; }
  .item-inner { padding:8px 4px 4px 4px; }
  .contexts { margin:.5rem 0; color:#333 }
  .badge { background:#eef7ff; border:1px solid #c5e2ff; padding:2px 8px; border-radius:999px; font-size:.85em; }
</style>
"#;

/// Escape `& < > " '` for HTML text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// One-line question for the collapsed case header.
fn summary_line(question: &str) -> String {
    let line = question.trim().replace('\n', " ");
    if line.chars().count() > SUMMARY_LINE_CHARS {
        format!("{}...", truncate_chars(&line, SUMMARY_LINE_CHARS - 3))
    } else {
        line
    }
}

/// Full standalone HTML document.
pub fn render(report: &EvalReport) -> String {
    let mut html = format!(
        "<!doctype html><meta charset='utf-8'><title>RAG Evaluation Report</title>{REPORT_CSS}<body>"
    );
    html.push_str("<h1>RAG Evaluation Report</h1>");
    html.push_str(&render_body(report));
    html.push_str("</body>");
    html
}

/// Summary cards and cases without the document wrapper, for embedding.
pub fn render_body(report: &EvalReport) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !report.summary.is_empty() {
        parts.push("<h2>Summary (mean scores)</h2>".into());
        parts.push("<div class='summary'>".into());
        for (name, score) in &report.summary {
            parts.push(format!(
                "<div class='card metric'><div>{}</div><div class='pill'>{}</div></div>",
                escape_html(name),
                fmt2(*score)
            ));
        }
        parts.push("</div>".into());
    }

    parts.push("<h2>Evaluation Cases</h2>".into());
    for (idx, result) in report.results.iter().enumerate() {
        let item = &result.item;
        parts.push("<details class='item'>".into());
        parts.push(format!(
            "<summary>Case {}: {}</summary>",
            idx + 1,
            escape_html(&summary_line(&item.question))
        ));
        parts.push("<div class='item-inner'>".into());
        parts.push(format!(
            "<div><span class='badge'>Question</span> {}</div>",
            escape_html(&item.question)
        ));
        if let Some(answer) = &item.answer {
            parts.push(format!(
                "<div><span class='badge'>Answer</span> {}</div>",
                escape_html(answer)
            ));
        }
        if let Some(secs) = result.eval_time_sec {
            parts.push(format!(
                "<div><span class='badge'>Eval time</span> {} s</div>",
                fmt2(secs)
            ));
        }
        if !item.contexts.is_empty() {
            parts.push("<div class='contexts'><span class='badge'>Contexts</span><ol>".into());
            for ctx in &item.contexts {
                parts.push(format!("<li>{}</li>", escape_html(ctx)));
            }
            parts.push("</ol></div>".into());
        }

        parts.push("<details open><summary>Metrics</summary>".into());
        parts.push("<div class='grid'>".into());
        for m in &result.metrics {
            parts.push("<div class='card'>".into());
            parts.push(format!(
                "<div class='metric'><div>{}</div><div class='pill'>{}</div></div>",
                escape_html(&m.name),
                fmt2(m.score)
            ));
            if let Some(explanation) = m.explanation.as_deref().filter(|e| !e.is_empty()) {
                parts.push(format!(
                    "<div class='mono'>{}</div>",
                    escape_html(explanation).replace('\n', "<br>")
                ));
            }
            if let Some(error) = &m.error {
                parts.push(format!("<div class='mono error'>{}</div>", escape_html(error)));
            }
            if !m.details.is_empty() {
                let pretty = serde_json::to_string_pretty(&m.details).unwrap_or_default();
                parts.push(format!(
                    "<details><summary>details</summary><pre class='mono'>{}</pre></details>",
                    escape_html(truncate_chars(&pretty, DETAILS_SNIPPET_CHARS))
                ));
            }
            if let Some(raw) = m.raw.as_ref().filter(|r| r.is_object()) {
                let compact = raw.to_string();
                parts.push(format!(
                    "<details><summary>raw</summary><pre class='mono'>{}</pre></details>",
                    escape_html(truncate_chars(&compact, RAW_SNIPPET_CHARS))
                ));
            }
            parts.push("</div>".into());
        }
        parts.push("</div></details>".into());
        parts.push("</div>".into());
        parts.push("</details>".into());
    }

    parts.concat()
}
