//! CSV exports: one row per (item, metric), or one flat row per item.

use crate::error::ReportError;
use crate::types::EvalReport;
use std::collections::BTreeSet;

pub const METRIC_COLUMNS: [&str; 9] = [
    "item_index",
    "metric",
    "score",
    "aggregate_for_item",
    "question",
    "answer",
    "contexts",
    "explanation",
    "eval_time_sec",
];

pub const ITEM_COLUMNS: [&str; 6] = [
    "item_index",
    "question",
    "answer",
    "n_contexts",
    "item_score",
    "eval_time_sec",
];

const CONTEXT_SEPARATOR: &str = " || ";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounded to two places; whole numbers keep their `.0`.
fn number_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", round2(v))).unwrap_or_default()
}

fn finish(writer: ::csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One row per metric verdict. The header is written even without rows.
pub fn metrics_csv(report: &EvalReport) -> Result<String, ReportError> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(METRIC_COLUMNS)?;

    for (idx, result) in report.results.iter().enumerate() {
        let item = &result.item;
        let contexts = item.contexts.join(CONTEXT_SEPARATOR);
        let aggregate = number_cell(result.aggregate);
        let eval_time = number_cell(result.eval_time_sec);
        for m in &result.metrics {
            writer.write_record([
                idx.to_string().as_str(),
                m.name.as_str(),
                number_cell(Some(m.score)).as_str(),
                aggregate.as_str(),
                item.question.as_str(),
                item.answer_text(),
                contexts.as_str(),
                m.explanation.as_deref().unwrap_or(""),
                eval_time.as_str(),
            ])?;
        }
    }
    finish(writer)
}

/// One row per item with a `metric__<name>` column for every metric seen.
pub fn items_csv(report: &EvalReport) -> Result<String, ReportError> {
    let metric_names: BTreeSet<&str> = report
        .results
        .iter()
        .flat_map(|r| r.metrics.iter().map(|m| m.name.as_str()))
        .collect();

    let mut writer = ::csv::Writer::from_writer(Vec::new());
    let header: Vec<String> = ITEM_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(metric_names.iter().map(|n| format!("metric__{n}")))
        .collect();
    writer.write_record(&header)?;

    for (idx, result) in report.results.iter().enumerate() {
        let item = &result.item;
        let mut row = vec![
            idx.to_string(),
            item.question.clone(),
            item.answer_text().to_string(),
            item.contexts.len().to_string(),
            number_cell(result.item_score()),
            number_cell(result.eval_time_sec),
        ];
        row.extend(
            metric_names
                .iter()
                .map(|name| number_cell(result.metric(name).map(|m| m.score))),
        );
        writer.write_record(&row)?;
    }
    finish(writer)
}
